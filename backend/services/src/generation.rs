//! Teaching material generation: assessment questions, topic content, and study plans.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use ocr_agents_core::{
    extract_json_array, extract_json_object, require_keys, truncate_chars, LlmProvider,
    LlmRequest, OcrAgentsError, Result,
};

const QUESTION_REFERENCE_CHARS: usize = 5_000;
const CONTENT_REFERENCE_CHARS: usize = 5_000;
const PLAN_REFERENCE_CHARS: usize = 2_000;
const MAX_QUESTIONS: i64 = 50;
const PLAN_FOCUS_AREAS: usize = 5;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceDocument {
    pub document_name: String,
    pub markdown: String,
}

/// Render reference documents for a prompt. Question prompts label the body with `CONTENT:`.
fn reference_context(references: &[ReferenceDocument], header: &str, limit: usize) -> String {
    let body_label = if header == "DOCUMENT" { "CONTENT:\n" } else { "" };
    references
        .iter()
        .map(|doc| {
            format!(
                "{header}: {}\n{body_label}{}",
                doc.document_name,
                truncate_chars(&doc.markdown, limit)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn parse_request<T: for<'de> Deserialize<'de>>(body: Value, what: &str) -> Result<T> {
    serde_json::from_value(body)
        .map_err(|e| OcrAgentsError::InvalidInput(format!("Invalid {what} request: {e}")))
}

fn object_or_empty(value: &Value) -> Value {
    if value.is_object() {
        value.clone()
    } else {
        Value::Object(Map::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            _ => Err(OcrAgentsError::InvalidInput("Invalid difficulty level".into())),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionTypes {
    MultipleChoice,
    Structured,
    Mixed,
}

impl QuestionTypes {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "multiple_choice" => Ok(Self::MultipleChoice),
            "structured" => Ok(Self::Structured),
            "mixed" => Ok(Self::Mixed),
            _ => Err(OcrAgentsError::InvalidInput("Invalid question type".into())),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::MultipleChoice => "multiple_choice",
            Self::Structured => "structured",
            Self::Mixed => "mixed",
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestionRequest {
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default)]
    question_types: Option<String>,
    #[serde(default)]
    number_of_questions: Option<Value>,
    #[serde(default)]
    attributes: Value,
    #[serde(default)]
    reference_documents: Vec<ReferenceDocument>,
    #[serde(default)]
    tags: Vec<String>,
}

/// Validated question generation request.
#[derive(Debug, Clone)]
pub struct QuestionSpec {
    pub context: Option<String>,
    pub difficulty: Difficulty,
    pub question_types: QuestionTypes,
    pub count: u32,
    pub attributes: Value,
    pub references: Vec<ReferenceDocument>,
    pub tags: Vec<String>,
}

impl QuestionSpec {
    /// Validate a request body. `allow_context` is false for the first API version.
    pub fn parse(body: Value, allow_context: bool) -> Result<Self> {
        let raw: RawQuestionRequest = parse_request(body, "question generation")?;

        let difficulty = Difficulty::parse(raw.difficulty.as_deref().unwrap_or("medium"))?;
        let question_types =
            QuestionTypes::parse(raw.question_types.as_deref().unwrap_or("multiple_choice"))?;

        // Must be a JSON integer; 5.0 and "5" are rejected.
        let count = match raw.number_of_questions {
            None => 5,
            Some(Value::Number(n)) if n.is_i64() || n.is_u64() => n.as_i64().unwrap_or(0),
            Some(_) => 0,
        };
        if !(1..=MAX_QUESTIONS).contains(&count) {
            return Err(OcrAgentsError::InvalidInput(
                "Number of questions must be 1-50".into(),
            ));
        }

        Ok(Self {
            context: if allow_context {
                raw.context.filter(|c| !c.trim().is_empty())
            } else {
                None
            },
            difficulty,
            question_types,
            count: count as u32,
            attributes: object_or_empty(&raw.attributes),
            references: raw.reference_documents,
            tags: raw.tags,
        })
    }

    pub fn prompt(&self) -> String {
        let context_line = self
            .context
            .as_ref()
            .map(|c| format!("5. ADDITIONAL CONTEXT: {c}"))
            .unwrap_or_default();
        let follow_context = if self.context.is_some() {
            "\n- Follow any specific instructions in the context"
        } else {
            ""
        };

        format!(
            r#"ROLE: Expert academic assessment designer
TASK: Create {count} high-quality assessment questions

REQUIREMENTS:
1. Difficulty: {difficulty}
2. Question Types: {types}
3. Key Attributes: {attributes}
4. Tags: {tags}
{context_line}

INSTRUCTIONS:
- Generate questions that assess understanding of key concepts
- Vary question types appropriately for mixed requests
- Ensure questions are unambiguous and test-relevant
- Provide clear correct answers and explanations
- Reference source materials when applicable{follow_context}
- Format response as JSON array only

CONTEXT MATERIALS:
{references}

RESPONSE FORMAT:
[
  {{
    "text": "Question text",
    "type": "multiple_choice|structured",
    "options": ["Option1", "Option2"],
    "correctAnswer": "Correct answer text or option index",
    "explanation": "Detailed explanation of answer",
    "difficulty": "easy|medium|hard",
    "tags": ["tag1", "tag2"]
  }}
]
Only multiple_choice questions carry "options".
"#,
            count = self.count,
            difficulty = self.difficulty.as_str(),
            types = self.question_types.as_str(),
            attributes = self.attributes,
            tags = self.tags.join(", "),
            references = reference_context(&self.references, "DOCUMENT", QUESTION_REFERENCE_CHARS),
        )
    }
}

/// Check every generated question has the fields clients rely on.
pub fn validate_questions(questions: &[Value]) -> Result<()> {
    for (i, q) in questions.iter().enumerate() {
        let n = i + 1;
        for key in ["text", "type", "correctAnswer", "explanation"] {
            if q.get(key).is_none() {
                return Err(OcrAgentsError::MalformedResponse(format!(
                    "Question {n} missing required fields"
                )));
            }
        }
        if q["type"] == "multiple_choice" && q.get("options").is_none() {
            return Err(OcrAgentsError::MalformedResponse(format!(
                "Multiple choice question {n} missing options"
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSpec {
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub attributes: Value,
    #[serde(default)]
    pub reference_documents: Vec<ReferenceDocument>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_topic() -> String {
    "Unspecified Topic".to_string()
}

impl ContentSpec {
    pub fn parse(body: Value) -> Result<Self> {
        parse_request(body, "content generation")
    }

    fn attribute(&self, key: &str, default: &str) -> String {
        match self.attributes.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => default.to_string(),
            Some(other) => other.to_string(),
        }
    }

    pub fn prompt(&self) -> String {
        let special = self
            .context
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .map(|c| format!("SPECIAL INSTRUCTIONS: {c}"))
            .unwrap_or_default();

        format!(
            r#"ROLE: Expert educator and curriculum designer
TASK: Create comprehensive educational content about: {topic}

REQUIREMENTS:
1. Audience: {audience}
2. Depth: {depth}
3. Duration: {duration}
4. Tags: {tags}

{special}

CONTENT STRUCTURE:
- Engaging introduction to the topic
- Clear explanations of key concepts
- Practical examples and applications
- Visual aid suggestions (diagrams, charts)
- Code implementations where applicable
- Real-world use cases
- Summary of key takeaways

FURTHER RESEARCH: 3-5 suggestions for deeper exploration, including research topics and learning resources.
KEY CONCEPTS: 3-5 core concepts to highlight.
LEARNING PATH: a structured learning sequence.

FORMAT: Markdown content with section headings, bullet lists, and code blocks where appropriate, wrapped in the JSON below.

REFERENCE MATERIALS:
{references}

RESPONSE FORMAT (JSON):
{{
    "topic": "{topic}",
    "content": "Markdown formatted educational content",
    "further_research": ["Suggestion 1", "Suggestion 2"],
    "key_concepts": ["Concept1", "Concept2"],
    "learning_path": ["Step 1", "Step 2"]
}}
"#,
            topic = self.topic,
            audience = self.attribute("audience", "General audience"),
            depth = self.attribute("depth", "Introductory"),
            duration = self.attribute("duration", "Self-paced"),
            tags = self.tags.join(", "),
            references = reference_context(&self.reference_documents, "REFERENCE", CONTENT_REFERENCE_CHARS),
        )
    }
}

/// Parse `"75%"`, `"75"`, or `75` into a number.
pub fn parse_percent(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
}

/// Render a number without a trailing `.0` when it is integral.
fn fmt_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAttributeDetail {
    name: String,
    current_score: Value,
    #[serde(default)]
    potential_score: Value,
    target_score: Value,
    gap: Value,
    #[serde(default)]
    weight: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDetail {
    pub name: String,
    pub current_score: f64,
    pub potential_score: Option<f64>,
    pub target_score: f64,
    pub gap: f64,
    pub weight: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlanRequest {
    first_name: String,
    last_name: String,
    course_name: String,
    #[serde(rename = "courseID")]
    course_id: String,
    current_overall_score: Value,
    target_score: Value,
    overall_performance: String,
    overall_engagement: String,
    attribute_details: Vec<RawAttributeDetail>,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    reference_documents: Vec<ReferenceDocument>,
}

/// Validated study plan request with focus areas already selected.
#[derive(Debug, Clone)]
pub struct StudyPlanSpec {
    pub student_name: String,
    pub course_name: String,
    pub course_id: String,
    pub current_score: f64,
    pub target_score: f64,
    pub performance: String,
    pub engagement: String,
    /// Largest gaps first, at most five.
    pub focus: Vec<AttributeDetail>,
    pub context: Option<String>,
    pub references: Vec<ReferenceDocument>,
}

fn required_percent(value: &Value, field: &str) -> Result<f64> {
    parse_percent(value).ok_or_else(|| {
        OcrAgentsError::InvalidInput(format!("Invalid study plan request: {field} is not a percentage"))
    })
}

impl StudyPlanSpec {
    pub fn parse(body: Value) -> Result<Self> {
        let raw: RawPlanRequest = parse_request(body, "study plan")?;

        let mut attributes = raw
            .attribute_details
            .into_iter()
            .map(|a| {
                Ok(AttributeDetail {
                    current_score: required_percent(&a.current_score, "currentScore")?,
                    potential_score: parse_percent(&a.potential_score),
                    target_score: required_percent(&a.target_score, "targetScore")?,
                    gap: required_percent(&a.gap, "gap")?,
                    weight: match a.weight {
                        Value::String(s) => s,
                        Value::Null => String::new(),
                        other => other.to_string(),
                    },
                    name: a.name,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        attributes.sort_by(|a, b| b.gap.total_cmp(&a.gap));
        attributes.truncate(PLAN_FOCUS_AREAS);

        Ok(Self {
            student_name: format!("{} {}", raw.first_name, raw.last_name),
            course_name: raw.course_name,
            course_id: raw.course_id,
            current_score: required_percent(&raw.current_overall_score, "currentOverallScore")?,
            target_score: required_percent(&raw.target_score, "targetScore")?,
            performance: raw.overall_performance,
            engagement: raw.overall_engagement,
            focus: attributes,
            context: raw.context.filter(|c| !c.trim().is_empty()),
            references: raw.reference_documents,
        })
    }

    /// Ceiling suggested to the model for `potentialOverall`.
    pub fn potential_overall(&self) -> f64 {
        (self.target_score + 5.0).min(100.0)
    }

    pub fn prompt(&self) -> String {
        let focus = self
            .focus
            .iter()
            .map(|a| {
                format!(
                    "- {}: Current {}% → Target {}% (Gap: {}%, Weight: {})",
                    a.name,
                    fmt_number(a.current_score),
                    fmt_number(a.target_score),
                    fmt_number(a.gap),
                    a.weight
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        let special = self
            .context
            .as_ref()
            .map(|c| format!("SPECIAL INSTRUCTIONS: {c}"))
            .unwrap_or_default();

        format!(
            r#"ROLE: Expert educational planner for {course}
TASK: Create a personalized development plan for {student}

STUDENT PROFILE:
- Current Overall: {current}%
- Target Overall: {target}%
- Performance Level: {performance}
- Engagement Level: {engagement}

FOCUS AREAS (prioritized by improvement need):
{focus}

{special}

PLAN REQUIREMENTS:
1. A precise plan name reflecting the primary improvement area
2. A concise description of the plan's objectives
3. Focus on the attributes listed above
4. 5-7 actionable steps with resource links
5. Varied activity types (videos, readings, assignments, quizzes)
6. A realistic time commitment (ETA in weeks)
7. An achievable potential overall score
8. 2-3 milestones
9. 3-5 key resources
10. For each focus attribute, 2-3 subskills with target scores and a color:
    red (urgent), yellow (important), blue (valuable), green (achieved)

REFERENCE MATERIALS:
{references}

RESPONSE FORMAT (JSON ONLY):
{{
    "name": "Plan name",
    "description": "Brief plan description",
    "progress": 0,
    "potentialOverall": {potential},
    "eta": 8,
    "performance": "Current performance status",
    "skills": [
        {{
            "name": "Attribute name",
            "score": {current},
            "subskills": [{{"name": "Specific subskill", "score": {target}, "color": "red|yellow|blue|green"}}]
        }}
    ],
    "courseId": "{course_id}",
    "steps": [{{"title": "Actionable step title", "type": "video|document|assignment|quiz", "link": "https://resource-link.example", "order": 1}}],
    "milestones": ["Milestone 1 description"],
    "resources": ["Resource 1"]
}}
"#,
            course = self.course_name,
            student = self.student_name,
            current = fmt_number(self.current_score),
            target = fmt_number(self.target_score),
            performance = self.performance,
            engagement = self.engagement,
            potential = fmt_number(self.potential_overall()),
            course_id = self.course_id,
            references = reference_context(&self.references, "REFERENCE", PLAN_REFERENCE_CHARS),
        )
    }
}

/// Generates teaching material with an LLM.
pub struct ContentGenerator {
    llm: Arc<dyn LlmProvider>,
    model: String,
}

impl ContentGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    async fn ask(&self, prompt: String) -> Result<String> {
        let response = self
            .llm
            .complete(&LlmRequest::prompt(&self.model, prompt))
            .await?;
        Ok(response.content)
    }

    fn wrap(&self, label: &str, e: OcrAgentsError) -> OcrAgentsError {
        warn!(kind = label, error = %e, "Generation failed");
        OcrAgentsError::upstream(self.llm.name(), format!("{label} generation failed: {e}"))
    }

    pub async fn questions(&self, spec: &QuestionSpec) -> Result<Vec<Value>> {
        let run = async {
            let text = self.ask(spec.prompt()).await?;
            let questions = extract_json_array(&text)?;
            validate_questions(&questions)?;
            Ok::<_, OcrAgentsError>(questions)
        };
        let questions = run.await.map_err(|e| self.wrap("Question", e))?;
        info!(requested = spec.count, generated = questions.len(), "Questions generated");
        Ok(questions)
    }

    pub async fn content(&self, spec: &ContentSpec) -> Result<Map<String, Value>> {
        let run = async {
            let text = self.ask(spec.prompt()).await?;
            let content = extract_json_object(&text)?;
            require_keys(
                &content,
                &["topic", "content", "further_research", "key_concepts"],
                "content",
            )?;
            Ok::<_, OcrAgentsError>(into_map(content))
        };
        let content = run.await.map_err(|e| self.wrap("Content", e))?;
        info!(topic = %spec.topic, "Content generated");
        Ok(content)
    }

    pub async fn study_plan(&self, spec: &StudyPlanSpec) -> Result<Map<String, Value>> {
        let run = async {
            let text = self.ask(spec.prompt()).await?;
            let plan = extract_json_object(&text)?;
            require_keys(&plan, &["name", "description", "steps", "skills", "eta"], "plan")?;
            Ok::<_, OcrAgentsError>(into_map(plan))
        };
        let plan = run.await.map_err(|e| self.wrap("Plan", e))?;
        info!(course = %spec.course_id, focus_areas = spec.focus.len(), "Study plan generated");
        Ok(plan)
    }
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocr_agents_providers::MockProvider;
    use serde_json::json;

    #[test]
    fn test_question_spec_defaults() {
        let spec = QuestionSpec::parse(json!({}), false).unwrap();
        assert_eq!(spec.difficulty, Difficulty::Medium);
        assert_eq!(spec.question_types, QuestionTypes::MultipleChoice);
        assert_eq!(spec.count, 5);
        assert!(spec.attributes.is_object());
    }

    #[test]
    fn test_question_spec_validation() {
        let err = QuestionSpec::parse(json!({"difficulty": "extreme"}), false).unwrap_err();
        assert_eq!(err.to_string(), "Invalid difficulty level");

        let err = QuestionSpec::parse(json!({"questionTypes": "essay"}), false).unwrap_err();
        assert_eq!(err.to_string(), "Invalid question type");

        for bad in [json!(0), json!(51), json!(5.5), json!("5")] {
            let err = QuestionSpec::parse(json!({"numberOfQuestions": bad}), false).unwrap_err();
            assert_eq!(err.to_string(), "Number of questions must be 1-50");
        }
    }

    #[test]
    fn test_question_context_only_in_second_version() {
        let body = json!({"context": "Focus on code", "numberOfQuestions": 3});
        assert!(QuestionSpec::parse(body.clone(), false).unwrap().context.is_none());

        let spec = QuestionSpec::parse(body, true).unwrap();
        assert!(spec.prompt().contains("5. ADDITIONAL CONTEXT: Focus on code"));
        assert!(spec.prompt().contains("Create 3 high-quality"));
    }

    #[test]
    fn test_question_references_truncated() {
        let spec = QuestionSpec::parse(
            json!({"referenceDocuments": [{"documentName": "notes.pdf", "markdown": "y".repeat(6000)}]}),
            false,
        )
        .unwrap();
        let prompt = spec.prompt();
        assert!(prompt.contains("DOCUMENT: notes.pdf\nCONTENT:\n"));
        assert!(!prompt.contains(&"y".repeat(5001)));
    }

    #[test]
    fn test_validate_questions() {
        let ok = vec![
            json!({"text": "Q", "type": "structured", "correctAnswer": "A", "explanation": "E"}),
            json!({"text": "Q", "type": "multiple_choice", "options": ["a"], "correctAnswer": 0, "explanation": "E"}),
        ];
        assert!(validate_questions(&ok).is_ok());

        let missing = vec![json!({"text": "Q", "type": "structured"})];
        assert!(validate_questions(&missing)
            .unwrap_err()
            .to_string()
            .contains("Question 1 missing required fields"));

        let no_options = vec![
            ok[0].clone(),
            json!({"text": "Q", "type": "multiple_choice", "correctAnswer": 0, "explanation": "E"}),
        ];
        assert!(validate_questions(&no_options)
            .unwrap_err()
            .to_string()
            .contains("Multiple choice question 2 missing options"));
    }

    #[test]
    fn test_content_spec_attribute_defaults() {
        let spec = ContentSpec::parse(json!({"attributes": {"audience": "Undergraduates"}})).unwrap();
        let prompt = spec.prompt();
        assert!(prompt.contains("about: Unspecified Topic"));
        assert!(prompt.contains("1. Audience: Undergraduates"));
        assert!(prompt.contains("2. Depth: Introductory"));
        assert!(prompt.contains("3. Duration: Self-paced"));
    }

    fn plan_body() -> Value {
        json!({
            "firstName": "John",
            "lastName": "Doe",
            "courseName": "Advanced Algorithms",
            "courseID": "CS401",
            "currentOverallScore": "75%",
            "targetScore": "97%",
            "overallPerformance": "Below Average",
            "overallEngagement": "Medium",
            "attributeDetails": [
                {"name": "Greedy", "currentScore": "80%", "targetScore": "90%", "gap": "10%", "weight": "10%"},
                {"name": "Dynamic Programming", "currentScore": "60%", "potentialScore": "85%", "targetScore": "90%", "gap": "30%", "weight": "40%"},
                {"name": "Graphs", "currentScore": 70, "targetScore": 90, "gap": 20, "weight": "20%"},
                {"name": "Sorting", "currentScore": "85%", "targetScore": "90%", "gap": "5%", "weight": "5%"},
                {"name": "Hashing", "currentScore": "88%", "targetScore": "90%", "gap": "2%", "weight": "5%"},
                {"name": "Strings", "currentScore": "89%", "targetScore": "90%", "gap": "1%", "weight": "5%"}
            ]
        })
    }

    #[test]
    fn test_parse_percent() {
        assert_eq!(parse_percent(&json!("75%")), Some(75.0));
        assert_eq!(parse_percent(&json!(" 62.5 % ")), Some(62.5));
        assert_eq!(parse_percent(&json!(40)), Some(40.0));
        assert_eq!(parse_percent(&json!("high")), None);
    }

    #[test]
    fn test_study_plan_focus_sorted_by_gap() {
        let spec = StudyPlanSpec::parse(plan_body()).unwrap();
        let names: Vec<&str> = spec.focus.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Dynamic Programming", "Graphs", "Greedy", "Sorting", "Hashing"]);
        assert_eq!(spec.potential_overall(), 100.0);
        assert_eq!(spec.student_name, "John Doe");

        let prompt = spec.prompt();
        assert!(prompt.contains("- Dynamic Programming: Current 60% → Target 90% (Gap: 30%, Weight: 40%)"));
        assert!(prompt.contains("\"courseId\": \"CS401\""));
        assert!(!prompt.contains("Strings"));
    }

    #[test]
    fn test_study_plan_missing_field_is_client_error() {
        let mut body = plan_body();
        body.as_object_mut().unwrap().remove("firstName");
        let err = StudyPlanSpec::parse(body).unwrap_err();
        assert!(err.is_client_error());
        assert!(err.to_string().contains("firstName"));
    }

    #[tokio::test]
    async fn test_generate_questions() {
        let llm = Arc::new(MockProvider::new("gemini").with_response(
            r#"```json
[{"text": "What is BFS?", "type": "structured", "correctAnswer": "Level order", "explanation": "Queue based"}]
```"#,
        ));
        let generator = ContentGenerator::new(llm, "gemini-1.5-flash");
        let spec = QuestionSpec::parse(json!({"numberOfQuestions": 1}), false).unwrap();

        let questions = generator.questions(&spec).await.unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0]["text"], "What is BFS?");
    }

    #[tokio::test]
    async fn test_generate_questions_failure_message() {
        let llm = Arc::new(MockProvider::new("gemini").with_response("no questions today"));
        let generator = ContentGenerator::new(llm, "gemini-1.5-flash");
        let spec = QuestionSpec::parse(json!({}), false).unwrap();

        let err = generator.questions(&spec).await.unwrap_err();
        match err {
            OcrAgentsError::Upstream { message, .. } => {
                assert_eq!(message, "Question generation failed: No JSON found in model response")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_generate_plan_requires_keys() {
        let llm = Arc::new(MockProvider::new("gemini").with_response(r#"{"name": "Plan"}"#));
        let generator = ContentGenerator::new(llm, "gemini-1.5-flash");
        let spec = StudyPlanSpec::parse(plan_body()).unwrap();

        let err = generator.study_plan(&spec).await.unwrap_err();
        assert!(err.to_string().contains("Plan generation failed"));
    }

    #[tokio::test]
    async fn test_generate_content() {
        let llm = Arc::new(MockProvider::new("gemini").with_response(
            r###"{"topic": "Sorting", "content": "## Sorting", "further_research": [], "key_concepts": ["Quick Sort"], "learning_path": []}"###,
        ));
        let generator = ContentGenerator::new(llm, "gemini-1.5-flash");
        let spec = ContentSpec::parse(json!({"topic": "Sorting"})).unwrap();

        let content = generator.content(&spec).await.unwrap();
        assert_eq!(content["key_concepts"][0], "Quick Sort");
    }
}
