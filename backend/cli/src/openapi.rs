use axum::response::{Html, Json};
use serde_json::{json, Map, Value};

/// How an operation receives its input.
#[derive(Clone, Copy)]
enum Body {
    None,
    Json,
    /// Multipart form with the given text fields and file field.
    Form(&'static [&'static str], &'static str),
}

struct Operation {
    method: &'static str,
    path: &'static str,
    tag: &'static str,
    summary: &'static str,
    body: Body,
}

const OPERATIONS: &[Operation] = &[
    Operation {
        method: "post",
        path: "/verify-document",
        tag: "OCR Processing",
        summary: "OCR with checklist-based document verification",
        body: Body::Form(&["category"], "file"),
    },
    Operation {
        method: "post",
        path: "/api/v1/agents/ocr/verify-document",
        tag: "OCR Processing",
        summary: "OCR processing with document category verification",
        body: Body::Form(&["category"], "file"),
    },
    Operation {
        method: "post",
        path: "/api/v1/agents/ocr/document",
        tag: "OCR Processing",
        summary: "OCR for PDF documents with verification",
        body: Body::Form(&["category"], "file"),
    },
    Operation {
        method: "post",
        path: "/ocr/image",
        tag: "OCR Processing",
        summary: "OCR for JPEG/PNG images with verification",
        body: Body::Form(&["category"], "file"),
    },
    Operation {
        method: "post",
        path: "/api/v1/agents/ocr/general",
        tag: "OCR Processing",
        summary: "General-purpose OCR for documents and images",
        body: Body::Form(&[], "files"),
    },
    Operation {
        method: "get",
        path: "/api/v1/agents/ocr/documents/{file_id}",
        tag: "Document Management",
        summary: "Retrieve stored document",
        body: Body::None,
    },
    Operation {
        method: "get",
        path: "/api/v1/agents/ocr/documents/{file_id}/info",
        tag: "Document Management",
        summary: "Get document metadata",
        body: Body::None,
    },
    Operation {
        method: "post",
        path: "/api/v1/agents/documents/upload-file",
        tag: "Document Management",
        summary: "Upload file to the document store",
        body: Body::Form(&[], "file"),
    },
    Operation {
        method: "get",
        path: "/api/v1/agents/documents/file-view/{file_id}",
        tag: "Document Management",
        summary: "View file in browser",
        body: Body::None,
    },
    Operation {
        method: "post",
        path: "/api/v1/agents/documents/extract-details",
        tag: "Data Extraction",
        summary: "Extract structured data from OCR-processed documents",
        body: Body::Json,
    },
    Operation {
        method: "post",
        path: "/api/v1/agents/student/assessment",
        tag: "Student Assessment",
        summary: "Evaluate student assignments with mark consistency",
        body: Body::Form(&["module"], "file"),
    },
    Operation {
        method: "post",
        path: "/api/v2/agents/student/assessment",
        tag: "Student Assessment",
        summary: "Evaluate assignments with custom marking schemes",
        body: Body::Form(&["module", "marking_scheme"], "file"),
    },
    Operation {
        method: "post",
        path: "/api/v1/agents/teacher/assessment-generation",
        tag: "Teacher Tools",
        summary: "Generate assessment questions",
        body: Body::Json,
    },
    Operation {
        method: "post",
        path: "/api/v2/agents/teacher/assessment-generation",
        tag: "Teacher Tools",
        summary: "Generate assessment questions with additional context",
        body: Body::Json,
    },
    Operation {
        method: "post",
        path: "/api/v1/agents/teacher/content-generation",
        tag: "Teacher Tools",
        summary: "Generate educational content",
        body: Body::Json,
    },
    Operation {
        method: "post",
        path: "/api/v1/agents/teacher/plan-generation",
        tag: "Teacher Tools",
        summary: "Generate a personalized study plan",
        body: Body::Json,
    },
    Operation {
        method: "get",
        path: "/api/v1/agents/health-check",
        tag: "System Health",
        summary: "Service health check",
        body: Body::None,
    },
];

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": {
            "application/json": { "schema": { "$ref": "#/components/schemas/HTTPError" } }
        }
    })
}

fn request_body(body: Body) -> Option<Value> {
    match body {
        Body::None => None,
        Body::Json => Some(json!({
            "required": true,
            "content": { "application/json": { "schema": { "type": ["object", "array"] } } }
        })),
        Body::Form(fields, file) => {
            let mut properties = Map::new();
            for field in fields {
                properties.insert(field.to_string(), json!({ "type": "string" }));
            }
            let file_schema = json!({ "type": "string", "format": "binary" });
            let file_schema = if file == "files" {
                json!({ "type": "array", "items": file_schema })
            } else {
                file_schema
            };
            properties.insert(file.to_string(), file_schema);

            let required: Vec<&str> = fields
                .iter()
                .copied()
                .filter(|f| *f != "marking_scheme")
                .chain(std::iter::once(file))
                .collect();
            Some(json!({
                "required": true,
                "content": {
                    "multipart/form-data": {
                        "schema": { "type": "object", "properties": properties, "required": required }
                    }
                }
            }))
        }
    }
}

fn operation(op: &Operation) -> Value {
    let mut responses = Map::new();
    responses.insert("200".into(), json!({ "description": "Successful response" }));
    if op.path.contains("{file_id}") {
        responses.insert("404".into(), error_response("Document not found"));
    }
    if !matches!(op.body, Body::None) {
        responses.insert("400".into(), error_response("Invalid request"));
        responses.insert("500".into(), error_response("Processing error"));
    }

    let mut value = json!({
        "tags": [op.tag],
        "summary": op.summary,
        "responses": responses,
    });
    if op.path.contains("{file_id}") {
        value["parameters"] = json!([{
            "name": "file_id",
            "in": "path",
            "required": true,
            "schema": { "type": "string" }
        }]);
    }
    if let Some(body) = request_body(op.body) {
        value["requestBody"] = body;
    }
    value
}

/// OpenAPI 3 description of the HTTP API.
pub fn document() -> Value {
    let mut paths = Map::new();
    for op in OPERATIONS {
        let entry = paths
            .entry(op.path.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        entry[op.method] = operation(op);
    }

    json!({
        "openapi": "3.1.0",
        "info": {
            "title": "OCR Agents API",
            "description": "Unified API for document OCR, image OCR, document verification, and teaching tools",
            "version": env!("CARGO_PKG_VERSION"),
            "license": {
                "name": "Apache 2.0",
                "url": "https://www.apache.org/licenses/LICENSE-2.0.html"
            }
        },
        "tags": [
            { "name": "OCR Processing", "description": "Endpoints for document OCR and verification" },
            { "name": "Document Management", "description": "Endpoints for file upload and retrieval" },
            { "name": "Data Extraction", "description": "Endpoints for extracting structured data from documents" },
            { "name": "Student Assessment", "description": "Assignment grading" },
            { "name": "Teacher Tools", "description": "Question, content, and study plan generation" },
            { "name": "System Health", "description": "Service health monitoring" }
        ],
        "paths": paths,
        "components": {
            "schemas": {
                "HTTPError": {
                    "type": "object",
                    "properties": {
                        "detail": { "type": "string", "example": "Error details" }
                    }
                }
            },
            "securitySchemes": {
                "BearerAuth": { "type": "http", "scheme": "bearer", "bearerFormat": "JWT" }
            }
        },
        "security": [{ "BearerAuth": [] }]
    })
}

pub async fn openapi_json() -> Json<Value> {
    Json(document())
}

const SWAGGER_UI: &str = r##"<!DOCTYPE html>
<html>
<head>
  <title>OCR Agents API - Swagger UI</title>
  <meta charset="utf-8">
  <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui.css">
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    SwaggerUIBundle({ url: "/openapi.json", dom_id: "#swagger-ui" });
  </script>
</body>
</html>
"##;

/// Interactive API docs.
pub async fn swagger_ui() -> Html<&'static str> {
    Html(SWAGGER_UI)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_route() {
        let doc = document();
        let paths = doc["paths"].as_object().unwrap();
        assert_eq!(paths.len(), OPERATIONS.len());
        assert!(doc["paths"]["/api/v1/agents/ocr/documents/{file_id}"]["get"].is_object());
        assert_eq!(
            doc["paths"]["/api/v1/agents/health-check"]["get"]["tags"][0],
            "System Health"
        );
    }

    #[test]
    fn test_error_schema_and_security() {
        let doc = document();
        assert_eq!(
            doc["components"]["schemas"]["HTTPError"]["properties"]["detail"]["type"],
            "string"
        );
        assert_eq!(doc["components"]["securitySchemes"]["BearerAuth"]["scheme"], "bearer");
        assert!(doc["security"][0]["BearerAuth"].is_array());
    }

    #[test]
    fn test_form_schema_marks_scheme_optional() {
        let doc = document();
        let schema = &doc["paths"]["/api/v2/agents/student/assessment"]["post"]["requestBody"]
            ["content"]["multipart/form-data"]["schema"];
        assert_eq!(schema["required"], json!(["module", "file"]));
        assert_eq!(schema["properties"]["marking_scheme"]["type"], "string");
    }
}
