//! Document category verification.
//!
//! Two flavors exist. [`CategoryVerifier`] backs the current OCR endpoints and
//! can suggest the category a document actually belongs to.
//! [`ChecklistVerifier`] backs the legacy endpoint and reports which mandatory
//! fields are missing for the declared category.
//!
//! Neither fails the request: model or parsing errors turn into a negative
//! verification carrying the failure reason.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use ocr_agents_core::{
    extract_json_object, require_keys, truncate_chars, DocumentCategory, LlmProvider, LlmRequest,
    Result,
};

/// Characters of OCR markdown sent to the model.
pub const VERIFICATION_CONTEXT_CHARS: usize = 15_000;

pub const CATEGORY_MODEL: &str = "mistral-large-latest";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryVerification {
    pub verified: bool,
    pub confidence: u8,
    pub reason: String,
    pub correct_category: DocumentCategory,
    pub initial_category: DocumentCategory,
}

impl CategoryVerification {
    fn failed(category: DocumentCategory, reason: impl std::fmt::Display) -> Self {
        Self {
            verified: false,
            confidence: 0,
            reason: format!("Verification failed: {reason}"),
            correct_category: category,
            initial_category: category,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChecklistVerification {
    pub verified: bool,
    pub confidence: u8,
    pub reason: String,
    pub missing_fields: Vec<String>,
}

fn as_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Confidence as an integer percentage. Accepts numbers or numeric strings.
fn as_confidence(value: &Value) -> u8 {
    let raw = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().trim_end_matches('%').parse().unwrap_or(0.0),
        _ => 0.0,
    };
    raw.round().clamp(0.0, 100.0) as u8
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn category_requirements() -> &'static str {
    r#"- "Proof of Identity": Government-issued ID with full name, ID number, date of birth
- "Proof of Residence": Shows name and physical address (utility bill, bank statement, lease, affidavit)
- "Proof of Income": Shows income details (salary amounts, pay periods, employer info)
- "Employment Letter": Company letterhead with employment details, signed by employer
- "Application Form": Filled application form with personal/financial details"#
}

pub fn category_prompt(category: DocumentCategory, markdown: &str) -> String {
    let content = truncate_chars(markdown, VERIFICATION_CONTEXT_CHARS);
    format!(
        r#"You are a bank branch consultant responsible for document verification.

Declared category: {category}

Tasks:
1. Decide whether the document content below contains the information required for the declared category.
2. If it does not, pick the most appropriate category from: {valid}
3. Give a confidence score from 0 to 100.
4. Explain the decision. When the document does not match, the reason must be concise and presentable to the client in one or two sentences.

Be strict. Respond with a JSON object only, with these keys:
- "verified": boolean (true only if the document clearly matches the declared category)
- "confidence": integer (0-100)
- "reason": string
- "correct_category": string (the most appropriate category)
- "initial_category": string (always "{category}")

Category requirements:
{requirements}

Document content:
{content}
"#,
        valid = DocumentCategory::valid_list(),
        requirements = category_requirements(),
    )
}

/// Verifies a declared category and suggests the right one on mismatch.
pub struct CategoryVerifier {
    llm: Arc<dyn LlmProvider>,
    model: String,
}

impl CategoryVerifier {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            model: CATEGORY_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub async fn verify(&self, category: DocumentCategory, markdown: &str) -> CategoryVerification {
        match self.try_verify(category, markdown).await {
            Ok(verification) => {
                info!(
                    category = %category,
                    verified = verification.verified,
                    confidence = verification.confidence,
                    correct_category = %verification.correct_category,
                    "Category verified"
                );
                verification
            }
            Err(e) => {
                warn!(category = %category, error = %e, "Category verification failed");
                CategoryVerification::failed(category, e)
            }
        }
    }

    async fn try_verify(
        &self,
        category: DocumentCategory,
        markdown: &str,
    ) -> Result<CategoryVerification> {
        let request =
            LlmRequest::prompt(&self.model, category_prompt(category, markdown)).with_json_mode();
        let response = self.llm.complete(&request).await?;
        let value = extract_json_object(&response.content)?;
        require_keys(
            &value,
            &["verified", "confidence", "reason", "correct_category"],
            "verification",
        )?;

        // Unknown suggestions fall back to the declared category.
        let correct_category = value["correct_category"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .unwrap_or(category);

        Ok(CategoryVerification {
            verified: as_bool(&value["verified"]),
            confidence: as_confidence(&value["confidence"]),
            reason: as_text(&value["reason"]),
            correct_category,
            initial_category: category,
        })
    }
}

/// Mandatory-content checklist per category, used by the legacy verifier.
pub fn checklist(category: DocumentCategory) -> &'static str {
    match category {
        DocumentCategory::ProofOfIdentity => {
            r#"Verify if this is a valid government-issued identity document.
It MUST contain:
- Full name of individual
- Unique identification number
- Date of birth
- Photograph of individual
- Issue date and/or expiration date
- Issuing authority (e.g., government agency)

Acceptable documents: National ID, Passport, Driver's License"#
        }
        DocumentCategory::ProofOfResidence => {
            r#"Verify if this is a valid proof of residence document.
It MUST contain:
- Full name of individual
- Complete physical address (street, city, postal code)
- Date of issue (must be within last 3 months)
- Issuing entity name and contact information

Acceptable documents: Utility bill, Bank statement, Lease agreement"#
        }
        DocumentCategory::ProofOfIncome => {
            r#"Verify if this is a valid proof of income document.
It MUST contain:
- Full name of individual
- Employer name
- Income amount (monthly or annual)
- Date range or pay period
- Document date (within last 3 months)

Acceptable documents: Payslip, Tax return, Bank statements showing salary deposits"#
        }
        DocumentCategory::EmploymentLetter => {
            r#"Verify if this is a valid employment verification letter.
It MUST contain:
- Company letterhead
- Full name of employee
- Employment start date
- Job position/title
- Salary information
- Contact information of issuer
- Signature of authorized representative"#
        }
        DocumentCategory::ApplicationForm => {
            r#"Verify if this is a completed application form.
It MUST contain:
- Personal details section (name, contact info)
- Financial information section
- Signature and date fields completed
- Relevant checkboxes selected"#
        }
    }
}

pub fn checklist_prompt(category: DocumentCategory, markdown: &str) -> String {
    format!(
        r#"ROLE: You are a bank branch consultant responsible for document verification.
TASK: Analyze the document content below and determine if it matches a "{category}" document.

VERIFICATION CRITERIA:
{criteria}

DOCUMENT CONTENT:
{content}

RESPONSE FORMAT: Return ONLY a JSON object with these keys:
- "verified": boolean (true ONLY if document clearly matches all category requirements)
- "confidence": integer (0-100, your confidence in verification)
- "reason": string (brief explanation of verification decision)
- "missing_fields": array of strings (any required fields missing)
"#,
        criteria = checklist(category),
        content = truncate_chars(markdown, VERIFICATION_CONTEXT_CHARS),
    )
}

/// Verifies a declared category against its mandatory-field checklist.
pub struct ChecklistVerifier {
    llm: Arc<dyn LlmProvider>,
    model: String,
}

impl ChecklistVerifier {
    pub fn new(llm: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    pub async fn verify(&self, category: DocumentCategory, markdown: &str) -> ChecklistVerification {
        match self.try_verify(category, markdown).await {
            Ok(v) => v,
            Err(e) => {
                warn!(category = %category, error = %e, "Checklist verification failed");
                ChecklistVerification {
                    verified: false,
                    confidence: 0,
                    reason: format!("Verification failed: {e}"),
                    missing_fields: Vec::new(),
                }
            }
        }
    }

    async fn try_verify(
        &self,
        category: DocumentCategory,
        markdown: &str,
    ) -> Result<ChecklistVerification> {
        let request = LlmRequest::prompt(&self.model, checklist_prompt(category, markdown));
        let response = self.llm.complete(&request).await?;
        let value = extract_json_object(&response.content)?;
        require_keys(
            &value,
            &["verified", "confidence", "reason", "missing_fields"],
            "verification",
        )?;

        let missing_fields = value["missing_fields"]
            .as_array()
            .map(|fields| fields.iter().map(as_text).collect())
            .unwrap_or_default();

        Ok(ChecklistVerification {
            verified: as_bool(&value["verified"]),
            confidence: as_confidence(&value["confidence"]),
            reason: as_text(&value["reason"]),
            missing_fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocr_agents_providers::MockProvider;

    fn verifier(response: &str) -> (Arc<MockProvider>, CategoryVerifier) {
        let llm = Arc::new(MockProvider::new("mistral").with_response(response));
        (llm.clone(), CategoryVerifier::new(llm))
    }

    #[tokio::test]
    async fn test_verified_document() {
        let (llm, verifier) = verifier(
            r#"{"verified": true, "confidence": 95, "reason": "All identity fields present", "correct_category": "Proof of Identity", "initial_category": "Proof of Identity"}"#,
        );

        let result = verifier
            .verify(DocumentCategory::ProofOfIdentity, "NATIONAL ID\nNAME: JOHN DOE")
            .await;

        assert!(result.verified);
        assert_eq!(result.confidence, 95);
        assert_eq!(result.correct_category, DocumentCategory::ProofOfIdentity);

        let requests = llm.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].json_mode);
        assert_eq!(requests[0].model, CATEGORY_MODEL);
        assert!(requests[0].user_prompt.contains("NAME: JOHN DOE"));
    }

    #[tokio::test]
    async fn test_suggests_other_category() {
        let (_, verifier) = verifier(
            r#"{"verified": false, "confidence": 88, "reason": "This is a payslip.", "correct_category": "Proof of Income"}"#,
        );
        let result = verifier.verify(DocumentCategory::ProofOfResidence, "PAYSLIP").await;
        assert!(!result.verified);
        assert_eq!(result.correct_category, DocumentCategory::ProofOfIncome);
        assert_eq!(result.initial_category, DocumentCategory::ProofOfResidence);
    }

    #[tokio::test]
    async fn test_unknown_suggestion_falls_back_to_declared() {
        let (_, verifier) = verifier(
            r#"{"verified": false, "confidence": "40", "reason": "Unclear", "correct_category": "Library Card"}"#,
        );
        let result = verifier.verify(DocumentCategory::ApplicationForm, "???").await;
        assert_eq!(result.correct_category, DocumentCategory::ApplicationForm);
        assert_eq!(result.confidence, 40);
    }

    #[tokio::test]
    async fn test_missing_keys_yield_failed_verification() {
        let (_, verifier) = verifier(r#"{"verified": true}"#);
        let result = verifier.verify(DocumentCategory::ProofOfIdentity, "text").await;
        assert!(!result.verified);
        assert_eq!(result.confidence, 0);
        assert!(result.reason.starts_with("Verification failed: "));
        assert_eq!(result.correct_category, DocumentCategory::ProofOfIdentity);
    }

    #[tokio::test]
    async fn test_provider_error_yields_failed_verification() {
        let llm = Arc::new(MockProvider::new("mistral").failing("rate limited"));
        let result = CategoryVerifier::new(llm)
            .verify(DocumentCategory::ProofOfIncome, "text")
            .await;
        assert!(!result.verified);
        assert!(result.reason.contains("rate limited"));
    }

    #[tokio::test]
    async fn test_prompt_truncates_content() {
        let long = "x".repeat(VERIFICATION_CONTEXT_CHARS + 500);
        let prompt = category_prompt(DocumentCategory::ProofOfIdentity, &long);
        assert!(prompt.contains(&"x".repeat(VERIFICATION_CONTEXT_CHARS)));
        assert!(!prompt.contains(&"x".repeat(VERIFICATION_CONTEXT_CHARS + 1)));
    }

    #[tokio::test]
    async fn test_checklist_verifier_reads_missing_fields() {
        let llm = Arc::new(MockProvider::new("gemini").with_response(
            "```json\n{\"verified\": false, \"confidence\": 70, \"reason\": \"No signature\", \"missing_fields\": [\"Signature of authorized representative\"]}\n```",
        ));
        let verifier = ChecklistVerifier::new(llm.clone(), "gemini-1.5-flash");
        let result = verifier.verify(DocumentCategory::EmploymentLetter, "ACME LETTER").await;

        assert!(!result.verified);
        assert_eq!(result.missing_fields, vec!["Signature of authorized representative"]);
        assert!(llm.requests()[0].user_prompt.contains("Company letterhead"));
    }

    #[tokio::test]
    async fn test_checklist_verifier_failure() {
        let llm = Arc::new(MockProvider::new("gemini").with_response("I cannot help with that."));
        let result = ChecklistVerifier::new(llm, "gemini-1.5-flash")
            .verify(DocumentCategory::ProofOfIdentity, "text")
            .await;
        assert_eq!(result.reason, "Verification failed: No JSON found in model response");
        assert!(result.missing_fields.is_empty());
    }
}
