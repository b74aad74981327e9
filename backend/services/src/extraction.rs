//! Applicant detail extraction across several OCR'd onboarding documents.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use ocr_agents_core::{
    extract_json_object, require_keys, truncate_chars, LlmProvider, LlmRequest, OcrAgentsError,
    Result,
};

/// Characters of each document's markdown included in the prompt.
pub const EXTRACTION_CONTEXT_CHARS: usize = 10_000;

pub const REQUIRED_SECTIONS: [&str; 4] = [
    "personalDetails",
    "contactDetails",
    "addressDetails",
    "employmentDetails",
];

/// One OCR-processed document submitted for extraction. Extra fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceDocument {
    pub category: String,
    pub markdown: String,
}

impl SourceDocument {
    /// Parse a request body, which must be a non-empty array of documents.
    pub fn parse_list(body: Value) -> Result<Vec<SourceDocument>> {
        let documents: Vec<SourceDocument> = match body {
            Value::Array(items) if !items.is_empty() => serde_json::from_value(Value::Array(items))
                .map_err(|e| OcrAgentsError::InvalidInput(format!("Invalid documents format: {e}")))?,
            _ => return Err(OcrAgentsError::InvalidInput("Invalid documents format".into())),
        };
        Ok(documents)
    }
}

fn field_instructions() -> Value {
    json!({
        "personalDetails": {
            "countryOfBirth": "Look in Proof of Identity document (National ID) for country of birth",
            "citizenship": "Infer from countryOfBirth if not found (ZIMBABWE → ZIMBABWEAN)",
            "identificationType": "Determine from document type (NATIONAL ID or PASSPORT)",
            "idNumber": "Search all documents for ID number (especially Proof of Identity)",
            "dateOfBirth": "Search all documents for date of birth (format: YYYY-MM-DD)",
            "gender": "Infer from title if possible (MR/SIR → Male, MRS/MS → Female)",
            "title": "Search all documents for title (MR, MRS, MS, etc.)",
            "firstname": "Search all documents for first name",
            "lastname": "Search all documents for last name",
            "maritalStatus": "Only include if explicitly found (SINGLE, MARRIED, etc.)",
            "religion": "Only include if explicitly found",
            "race": "Only include if explicitly found",
            "numberOfDependents": "Only include if explicitly found",
            "highestLevelOfEducation": "Only include if explicitly found",
            "birthDistrict": "Search Proof of Identity for birth district"
        },
        "contactDetails": {
            "primaryMethodOfCommunication": "Only include if explicitly found",
            "email": "Search all documents for email address",
            "phoneNumber": "Search all documents for phone number",
            "telephoneNumber": "Search all documents for telephone number",
            "facebook": "Only include if explicitly found",
            "twitter": "Only include if explicitly found",
            "linkedin": "Only include if explicitly found",
            "skype": "Only include if explicitly found"
        },
        "addressDetails": {
            "addressType": "Default to RESIDENTIAL if found in Proof of Residence",
            "addressLine": "Extract from Proof of Residence",
            "street": "Extract from Proof of Residence",
            "suburb": "Extract from Proof of Residence",
            "city": "Extract from Proof of Residence",
            "country": "Infer from Proof of Identity if not found",
            "postalCode": "Only include if explicitly found",
            "periodOfResidenceInYears": "Only include if explicitly found",
            "periodOfResidenceInMonths": "Only include if explicitly found",
            "monthlyRentalAmount": "Only include if explicitly found",
            "homeOwnership": "Only include if explicitly found"
        },
        "employmentDetails": {
            "employerName": "Extract from Employment Letter",
            "phoneNumber": "Extract from Employment Letter",
            "telephoneNumber": "Extract from Employment Letter",
            "email": "Extract from Employment Letter",
            "address": "Extract from Employment Letter",
            "jobTitle": "Extract from Employment Letter",
            "industry": "Extract from Employment Letter",
            "monthlyGrossIncome": "Only include if explicitly found",
            "monthlyNetIncome": "Only include if explicitly found",
            "employmentType": "Only include if explicitly found",
            "employmentDate": "Only include if explicitly found (format: YYYY-MM-DD)",
            "employmentEndDate": "Only include if explicitly found (format: YYYY-MM-DD)",
            "sourceOfFunds": "Extract from Employment Letter or Proof of Income"
        }
    })
}

fn output_skeleton() -> Value {
    json!({
        "personalDetails": {
            "countryOfBirth": "", "citizenship": "", "identificationType": "", "idNumber": "",
            "dateOfBirth": "", "gender": "", "title": "", "firstname": "", "lastname": "",
            "maritalStatus": "", "religion": "", "race": "", "numberOfDependents": 0,
            "highestLevelOfEducation": "", "birthDistrict": ""
        },
        "contactDetails": {
            "primaryMethodOfCommunication": "", "email": "", "phoneNumber": "",
            "telephoneNumber": "", "facebook": "", "twitter": "", "linkedin": "", "skype": ""
        },
        "addressDetails": [{
            "addressType": "", "addressLine": "", "street": "", "suburb": "", "city": "",
            "country": "", "postalCode": "", "periodOfResidenceInYears": "0",
            "periodOfResidenceInMonths": "0", "monthlyRentalAmount": "0", "homeOwnership": ""
        }],
        "employmentDetails": {
            "employerName": "", "phoneNumber": "", "telephoneNumber": "", "email": "",
            "address": "", "jobTitle": "", "industry": "", "monthlyGrossIncome": 0.0,
            "monthlyNetIncome": 0.0, "employmentType": "", "employmentDate": "",
            "employmentEndDate": "",
            "sourceOfFunds": [{ "source": "", "currency": "", "amount": 0.0 }]
        }
    })
}

pub fn extraction_prompt(documents: &[SourceDocument]) -> String {
    let context = documents
        .iter()
        .map(|doc| {
            format!(
                "DOCUMENT CATEGORY: {}\nCONTENT:\n{}",
                doc.category,
                truncate_chars(&doc.markdown, EXTRACTION_CONTEXT_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let instructions = serde_json::to_string_pretty(&field_instructions()).unwrap_or_default();
    let skeleton = serde_json::to_string_pretty(&output_skeleton()).unwrap_or_default();

    format!(
        r#"ROLE: You are a bank branch consultant responsible for extracting applicant details from onboarding documents.
TASK: Analyze the document content below and extract relevant information to populate the JSON structure.

INSTRUCTIONS:
1. BE STRICT: Only extract values that are EXPLICITLY stated in the documents. Do not guess or assume values.
2. COMPARE DOCUMENTS: When the same field appears in multiple documents, verify consistency. If values conflict, use the value from the most authoritative document (Proof of Identity > Employment Letter > Proof of Residence).
3. INFER ONLY WHEN LOGICAL:
   - If countryOfBirth is "ZIMBABWE", set citizenship to "ZIMBABWEAN"
   - Map titles to gender: MR/SIR → Male, MRS/MS → Female
4. FORMATTING:
   - All string values MUST BE IN UPPERCASE
   - Dates must be in YYYY-MM-DD format
   - Zimbabwean ID numbers follow XX-XXXXXXX [A-Z] XX or XX-XXXXXX [A-Z] XX (e.g. 08-123456 D 53).
     Return them without spaces or separators: "08-123456 D 53" becomes "08123456D53".
   - Numbers should be in numerical format (not words)
5. MISSING DATA: Leave fields blank if information is not found in any document.
6. STRUCTURE: Return ONLY a JSON object with the exact structure specified below.

DOCUMENT CONTENT:
{context}

FIELD MAPPING INSTRUCTIONS:
{instructions}

REQUIRED JSON STRUCTURE:
{skeleton}
"#
    )
}

/// Keep ASCII letters and digits only.
pub fn sanitize_id_number(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Upper-case every string leaf, leaving email addresses as returned.
fn uppercase_strings(value: &mut Value, key: Option<&str>) {
    match value {
        Value::String(s) => {
            let is_email = key.is_some_and(|k| k.to_ascii_lowercase().contains("email"));
            if !is_email {
                *s = s.to_uppercase();
            }
        }
        Value::Array(items) => {
            for item in items {
                uppercase_strings(item, key);
            }
        }
        Value::Object(map) => {
            for (k, v) in map.iter_mut() {
                uppercase_strings(v, Some(k.as_str()));
            }
        }
        _ => {}
    }
}

/// Apply the extraction formatting rules server-side.
pub fn normalize_details(details: &mut Value) {
    uppercase_strings(details, None);
    if let Some(Value::String(id)) = details.pointer_mut("/personalDetails/idNumber") {
        *id = sanitize_id_number(id);
    }
}

/// Extracts structured applicant details with an LLM.
pub struct DetailExtractor {
    llm: Arc<dyn LlmProvider>,
    model: String,
}

impl DetailExtractor {
    pub fn new(llm: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    pub async fn extract(&self, documents: &[SourceDocument]) -> Result<Map<String, Value>> {
        self.try_extract(documents).await.map_err(|e| {
            warn!(documents = documents.len(), error = %e, "Extraction failed");
            OcrAgentsError::upstream(self.llm.name(), format!("Extraction failed: {e}"))
        })
    }

    async fn try_extract(&self, documents: &[SourceDocument]) -> Result<Map<String, Value>> {
        let request = LlmRequest::prompt(&self.model, extraction_prompt(documents));
        let response = self.llm.complete(&request).await?;
        let mut details = extract_json_object(&response.content)?;
        require_keys(&details, &REQUIRED_SECTIONS, "extraction")?;

        normalize_details(&mut details);
        info!(documents = documents.len(), tokens = response.tokens_used, "Details extracted");

        match details {
            Value::Object(map) => Ok(map),
            _ => Err(OcrAgentsError::MalformedResponse("expected a JSON object".into())),
        }
    }
}
