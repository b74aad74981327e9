//! Student assignment grading with a server-side mark consistency check.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{info, warn};

use ocr_agents_core::{
    extract_json_object, require_keys, truncate_chars, AcademicModule, LlmProvider, LlmRequest,
    OcrAgentsError, Result,
};

pub const ASSESSMENT_CONTEXT_CHARS: usize = 15_000;

const REQUIRED_KEYS: [&str; 5] = [
    "is_correct_module",
    "confidence_assessment_score",
    "marks_percentage",
    "overall_feedback",
    "assessment_details",
];

const STANDARD_CRITERIA: &str = "\
1. Content Accuracy (30%): Demonstrated understanding of concepts
2. Critical Thinking (25%): Application of knowledge to solve problems
3. Organization (20%): Logical structure and clarity of solutions
4. Completeness (15%): All requirements addressed
5. Presentation (10%): Readability and proper formatting";

/// Parse a client-supplied marking scheme. Empty input means no scheme.
pub fn parse_marking_scheme(raw: Option<&str>) -> Result<Option<Value>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => serde_json::from_str(text)
            .map(Some)
            .map_err(|e| OcrAgentsError::InvalidInput(format!("Invalid marking scheme JSON: {e}"))),
    }
}

/// How the marks reported by the model compare with the per-question breakdown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkTally {
    pub awarded: f64,
    pub possible: f64,
    pub percentage: i64,
}

fn number(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Sum `awarded_marks` and `max_marks` across questions.
///
/// Percentages round half to even.
pub fn tally_marks(details: &Value) -> MarkTally {
    let (awarded, possible) = details
        .as_object()
        .map(|questions| {
            questions.values().fold((0.0, 0.0), |(a, p), q| {
                (a + number(q.get("awarded_marks")), p + number(q.get("max_marks")))
            })
        })
        .unwrap_or((0.0, 0.0));

    let percentage = if possible > 0.0 {
        (awarded / possible * 100.0).round_ties_even() as i64
    } else {
        0
    };

    MarkTally {
        awarded,
        possible,
        percentage,
    }
}

/// `"Verified"` when the reported percentage matches the tally.
pub fn consistency_note(tally: &MarkTally, reported: &Value) -> String {
    let reported_value = number(Some(reported));
    if (reported_value - tally.percentage as f64).abs() < f64::EPSILON {
        "Verified".to_string()
    } else {
        let shown = match reported {
            Value::Null => "0".to_string(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        format!(
            "Inconsistency detected: Calculated {}% vs Reported {}%",
            tally.percentage, shown
        )
    }
}

pub fn assessment_prompt(module: AcademicModule, markdown: &str, scheme: Option<&Value>) -> String {
    let grading = match scheme {
        Some(scheme) => format!(
            "MARKING SCHEME PROVIDED:\n{}",
            serde_json::to_string_pretty(scheme).unwrap_or_else(|_| scheme.to_string())
        ),
        None => format!("STANDARD ASSESSMENT CRITERIA:\n{STANDARD_CRITERIA}"),
    };

    format!(
        r#"ROLE: You are an experienced educator assessing student assignments.
TASK: Evaluate the submitted assignment{scheme_note} and keep marks consistent.

INSTRUCTIONS:
1. Verify if the content matches the module: {module}
2. If content doesn't match:
   - Identify the actual module it fits
   - Set is_correct_module=false
   - Provide clear feedback about the mismatch
3. If content is illegible or unclear:
   - Set confidence_assessment_score=0
   - Ask the student to redo and resubmit
4. For valid submissions:
   - Identify and assess each question individually
   - Assign marks to each question (state the maximum per question)
   - Total marks are SUM(question_marks)
   - marks_percentage = SUM(question_marks) / TOTAL_POSSIBLE_MARKS * 100
   - For each question give feedback, the mark awarded, and a concrete improvement

{grading}

MODULE: {module}
ASSIGNMENT CONTENT:
{content}

RESPONSE FORMAT (JSON ONLY):
{{
    "is_correct_module": boolean,
    "confidence_assessment_score": integer (0-100),
    "total_possible_marks": integer,
    "marks_achieved": integer,
    "marks_percentage": integer (0-100),
    "overall_feedback": string,
    "strengths": [string],
    "improvements": [string],
    "criteria": [{{"criterion": string, "score": integer, "feedback": string}}],
    "assessment_details": {{
        "question_1": {{"max_marks": integer, "awarded_marks": integer, "feedback": string, "improvement": string}}
    }},
    "detected_module": string (if mismatched)
}}
"#,
        scheme_note = if scheme.is_some() { " using the provided marking scheme" } else { "" },
        content = truncate_chars(markdown, ASSESSMENT_CONTEXT_CHARS),
    )
}

/// Grades assignments with an LLM.
pub struct AssignmentAssessor {
    llm: Arc<dyn LlmProvider>,
    model: String,
}

impl AssignmentAssessor {
    pub fn new(llm: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    /// Grade against the standard criteria.
    pub async fn assess(&self, module: AcademicModule, markdown: &str) -> Map<String, Value> {
        self.run(module, markdown, None, false).await
    }

    /// Grade against an optional marking scheme and report whether one was used.
    pub async fn assess_with_scheme(
        &self,
        module: AcademicModule,
        markdown: &str,
        scheme: Option<&Value>,
    ) -> Map<String, Value> {
        self.run(module, markdown, scheme, true).await
    }

    async fn run(
        &self,
        module: AcademicModule,
        markdown: &str,
        scheme: Option<&Value>,
        report_scheme: bool,
    ) -> Map<String, Value> {
        let (mut assessment, graded) = match self.try_assess(module, markdown, scheme).await {
            Ok(assessment) => (assessment, true),
            Err(e) => {
                warn!(module = %module, error = %e, "Assessment failed");
                (failed_assessment(&e), false)
            }
        };
        if report_scheme {
            let used = graded && scheme.is_some();
            assessment.insert("marking_scheme_used".into(), Value::Bool(used));
        }
        assessment
    }

    async fn try_assess(
        &self,
        module: AcademicModule,
        markdown: &str,
        scheme: Option<&Value>,
    ) -> Result<Map<String, Value>> {
        let request = LlmRequest::prompt(&self.model, assessment_prompt(module, markdown, scheme));
        let response = self.llm.complete(&request).await?;
        let value = extract_json_object(&response.content)?;
        require_keys(&value, &REQUIRED_KEYS, "assessment")?;

        let Value::Object(mut assessment) = value else {
            return Err(OcrAgentsError::MalformedResponse("expected a JSON object".into()));
        };

        let tally = tally_marks(&assessment["assessment_details"]);
        let note = consistency_note(&tally, &assessment["marks_percentage"]);
        info!(
            module = %module,
            awarded = tally.awarded,
            possible = tally.possible,
            consistency = %note,
            "Assignment assessed"
        );
        assessment.insert("mark_consistency_check".into(), Value::String(note));
        Ok(assessment)
    }
}

fn failed_assessment(error: &OcrAgentsError) -> Map<String, Value> {
    let value = json!({
        "is_correct_module": false,
        "confidence_assessment_score": 0,
        "total_possible_marks": 0,
        "marks_achieved": 0,
        "marks_percentage": 0,
        "overall_feedback": format!("Assessment failed: {error}"),
        "strengths": [],
        "improvements": ["Technical error occurred during assessment"],
        "criteria": [],
        "assessment_details": {},
        "mark_consistency_check": "Not performed due to error"
    });
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
