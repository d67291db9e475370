//! Prompts for the header and details completions.

use recibo_llm::{ChatMessage, CompletionRequest};

use crate::models::ExtractionConfig;

const HEADER_SYSTEM: &str = "You are a specialized document parser focusing on extracting header \
information. Your response MUST be a single, valid JSON object.";

const DETAILS_SYSTEM: &str = "You are a specialized document parser focusing on extracting detailed \
line items. Process ALL items without limit. Your response MUST be a single, valid JSON object.";

/// Header prompt for the given document text.
pub fn header_prompt(text: &str) -> String {
    format!(
        r#"Extract ONLY the header information from this document.

Document text:
{text}

Focus on finding:
- Business/Company name or Person name
- Tax ID (RNC, RUC, NIT, NIF, CUIT or "Identificación Fiscal")
- Document date
- Document number/reference

Example input:
RESTAURANTE DEL CONGRESO
Almacen de Restaurante
RNC: 1-01-12345-6
Fecha: 19/11/2024
No. Documento 990

Expected output format:
{{
  "header": {{
    "name": "RESTAURANTE DEL CONGRESO",
    "taxId": "1-01-12345-6",
    "date": "19/11/2024",
    "documentNumber": "990"
  }}
}}

Use an empty string for any field that is not present.
RESPOND ONLY WITH THE EXACT JSON FORMAT SHOWN - NO OTHER TEXT"#
    )
}

/// Details prompt for one chunk of the line-item table.
pub fn details_prompt(chunk: &str) -> String {
    format!(
        r#"Extract line items from this document following EXACTLY this format.

Example input:
DESCRIPCION CANTIDAD UND MEDIDA COSTO ITBS TOTAL
ACEITE DE AJONJOLI SESAME 24 FCO 12.502 $ 642.00 $ 2,773.44 $ 15,408.00
ACEITE DE OLIVA EXTRA VIRGEN 10 5 LITROS $ 5,435.00 $ 9,783.00 $ 54,350.00
ACEITE LEVAPAN* 15 CAJA 2/1 $ 2,919.00 $ 7,005.60 $ 43,785.00

CRITICAL RULES:
1. Process EVERY line item found after the header row
2. Keep ALL special characters (* or **) in descriptions
3. Remove ALL currency symbols ($ or RD$)
4. Keep unit measures EXACTLY as shown (e.g., "FCO", "5 LITROS", "CAJA 2/1")
5. Preserve ALL decimal places in numbers
6. Keep items in EXACT original order
7. Join multi-line descriptions into one
8. Write ALL numeric values as JSON numbers
9. Use 0 for discount when the document shows none

Expected output format:
{{
  "details": [
    {{
      "itemCode": "",
      "description": "ACEITE DE AJONJOLI SESAME",
      "unitOfMeasure": "FCO",
      "quantity": 24,
      "grossPrice": 642.00,
      "discount": 0,
      "tax": 2773.44,
      "netValue": 15408.00
    }},
    {{
      "itemCode": "",
      "description": "ACEITE DE OLIVA EXTRA VIRGEN",
      "unitOfMeasure": "5 LITROS",
      "quantity": 10,
      "grossPrice": 5435.00,
      "discount": 0,
      "tax": 9783.00,
      "netValue": 54350.00
    }}
  ]
}}

Document text to process:
{chunk}

RESPOND ONLY WITH THE EXACT JSON FORMAT SHOWN - NO OTHER TEXT"#
    )
}

/// Completion request for the header section.
pub fn header_request(text: &str, config: &ExtractionConfig) -> CompletionRequest {
    CompletionRequest::new(vec![
        ChatMessage::system(HEADER_SYSTEM),
        ChatMessage::user(header_prompt(text)),
    ])
    .with_temperature(config.temperature)
    .with_max_tokens(config.header_max_tokens)
}

/// Completion request for one details chunk.
pub fn details_request(chunk: &str, config: &ExtractionConfig) -> CompletionRequest {
    CompletionRequest::new(vec![
        ChatMessage::system(DETAILS_SYSTEM),
        ChatMessage::user(details_prompt(chunk)),
    ])
    .with_temperature(config.temperature)
    .with_max_tokens(config.details_max_tokens)
}
