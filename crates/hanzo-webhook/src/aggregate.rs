//! Enhanced OCR result aggregation
//!
//! The invoice pipeline reports its enhanced result either under
//! `results[0]` (legacy) or flattened at the top level (current). Both carry
//! `summary`, `financialSummary`, `processingDetails`, `qualityMetrics` and
//! `recommendations`.

use crate::envelope::unwrap_value;
use crate::record::{
    BasicOcrSummary, DuplicateRecord, FailureRecord, FinancialSummary, InvoiceRecord,
    OcrProcessingSummary, QualityRecord,
};
use serde_json::{Map, Value};
use tracing::debug;

/// Enhanced sub-records and the JSON type each must have when present
const ENHANCED_KEYS: &[(&str, fn(&Value) -> bool)] = &[
    ("summary", Value::is_object),
    ("financialSummary", Value::is_object),
    ("processingDetails", Value::is_array),
    ("qualityMetrics", Value::is_object),
];

/// At least one of these must be present for a payload to count as enhanced
const ANCHOR_KEYS: &[&str] = &["financialSummary", "processingDetails"];

const SUCCESS_STATUSES: &[&str] = &["success", "succeeded", "completed", "complete", "ok", "processed"];

/// Build the enhanced summary, or `None` when the payload has neither shape
pub fn aggregate(payload: &Value) -> Option<OcrProcessingSummary> {
    let payload = unwrap_value(payload.clone()).value;
    let section = enhanced_section(&payload)?;

    let summary = section.get("summary").and_then(Value::as_object);
    let details: &[Value] = section
        .get("processingDetails")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let (derived_ok, derived_failed) = split_details(details);
    let successful_extractions = summary
        .and_then(|s| s.get("successfulExtractions"))
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_object).map(invoice_record).collect())
        .unwrap_or(derived_ok);
    let failed_extractions = summary
        .and_then(|s| s.get("failedExtractions"))
        .and_then(Value::as_array)
        .map(|items| items.iter().map(failure_record).collect())
        .unwrap_or(derived_failed);

    let total_items = summary
        .and_then(|s| first_count(s, &["totalItems", "totalFiles", "total", "totalProcessed"]))
        .unwrap_or_else(|| {
            if details.is_empty() {
                successful_extractions.len() + failed_extractions.len()
            } else {
                details.len()
            }
        });

    let quality = section.get("qualityMetrics").and_then(Value::as_object);
    let quality_issues = quality
        .and_then(|q| first_array(q, &["issues", "lowConfidence", "qualityIssues"]))
        .map(|items| items.iter().filter_map(quality_record).collect())
        .unwrap_or_default();
    let duplicates = quality
        .and_then(|q| first_array(q, &["duplicates", "duplicateInvoices"]))
        .or_else(|| summary.and_then(|s| first_array(s, &["duplicates"])))
        .map(|items| items.iter().filter_map(duplicate_record).collect())
        .unwrap_or_default();

    let financial_summary = section
        .get("financialSummary")
        .and_then(Value::as_object)
        .map(|f| financial_summary(f, successful_extractions.len()))
        .unwrap_or_else(|| FinancialSummary {
            count: successful_extractions.len(),
            ..Default::default()
        });

    let recommendations = section
        .get("recommendations")
        .map(recommendation_list)
        .unwrap_or_default();

    let result = OcrProcessingSummary {
        total_items,
        successful_extractions,
        failed_extractions,
        quality_issues,
        duplicates,
        financial_summary,
        recommendations,
    };
    if result.has_count_discrepancy() {
        debug!(
            count = result.financial_summary.count,
            extracted = result.successful_extractions.len(),
            "financial summary count disagrees with extractions"
        );
    }
    Some(result)
}

/// Read the basic completion payload the pipeline sends without enhanced data
pub fn basic_summary(payload: &Value) -> BasicOcrSummary {
    let payload = unwrap_value(payload.clone()).value;
    let Some(obj) = payload.as_object() else {
        return BasicOcrSummary::default();
    };
    let success = match obj.get("success") {
        Some(Value::Bool(b)) => *b,
        _ => obj
            .get("status")
            .and_then(Value::as_str)
            .is_some_and(is_success_status),
    };
    BasicOcrSummary {
        success,
        processed: first_count(obj, &["processed", "processedCount", "successCount", "totalProcessed"])
            .unwrap_or_default(),
        failed: first_count(obj, &["failed", "failedCount", "errorCount"]).unwrap_or_default(),
        batch_id: first_text(obj, &["batchId", "batch_id", "executionId"]),
        message: first_text(obj, &["message", "status"]),
    }
}

/// Parse a currency-formatted amount like `"$1,234.56"`.
///
/// Everything but digits, `.` and `-` is dropped; unparseable input is 0.
pub fn parse_currency(text: &str) -> f64 {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    match cleaned.parse::<f64>() {
        Ok(n) if n.is_finite() => n,
        _ => 0.0,
    }
}

fn enhanced_section(payload: &Value) -> Option<&Map<String, Value>> {
    let obj = payload.as_object()?;

    if let Some(first) = obj
        .get("results")
        .and_then(Value::as_array)
        .and_then(|r| r.first())
        .and_then(Value::as_object)
    {
        if is_enhanced(first) {
            debug!("enhanced OCR payload in legacy results envelope");
            return Some(first);
        }
    }
    if is_enhanced(obj) {
        debug!("enhanced OCR payload in flattened shape");
        return Some(obj);
    }
    None
}

fn is_enhanced(obj: &Map<String, Value>) -> bool {
    let well_typed = ENHANCED_KEYS
        .iter()
        .all(|(key, expected)| obj.get(*key).map_or(true, |v| expected(v)));
    well_typed && ANCHOR_KEYS.iter().any(|key| obj.contains_key(*key))
}

fn split_details(details: &[Value]) -> (Vec<InvoiceRecord>, Vec<FailureRecord>) {
    let mut ok = Vec::new();
    let mut failed = Vec::new();
    for entry in details.iter().filter_map(Value::as_object) {
        let succeeded = entry
            .get("status")
            .and_then(Value::as_str)
            .map(is_success_status)
            .or_else(|| entry.get("success").and_then(Value::as_bool))
            .unwrap_or(false);
        if succeeded {
            ok.push(invoice_record(entry));
        } else {
            failed.push(failure_record(&Value::Object(entry.clone())));
        }
    }
    (ok, failed)
}

fn is_success_status(status: &str) -> bool {
    SUCCESS_STATUSES.contains(&status.trim().to_ascii_lowercase().as_str())
}

fn invoice_record(entry: &Map<String, Value>) -> InvoiceRecord {
    let data = entry
        .get("extractedData")
        .or_else(|| entry.get("data"))
        .and_then(Value::as_object)
        .unwrap_or(entry);
    let field = |keys: &[&str]| first_text(data, keys).or_else(|| first_text(entry, keys));
    InvoiceRecord {
        file_name: first_text(entry, &["fileName", "filename", "file"]),
        invoice_number: field(&["invoiceNumber", "invoice_number", "invoiceId"]),
        vendor: field(&["vendor", "vendorName", "supplier", "supplierName"]),
        date: field(&["date", "invoiceDate", "invoice_date"]),
        total: ["total", "totalAmount", "amount", "grandTotal"]
            .iter()
            .find_map(|k| data.get(*k).or_else(|| entry.get(*k)))
            .map(amount),
        currency: field(&["currency"]),
        confidence: ["confidence", "confidenceScore"]
            .iter()
            .find_map(|k| entry.get(*k).or_else(|| data.get(*k)))
            .map(amount),
    }
}

fn failure_record(value: &Value) -> FailureRecord {
    match value {
        Value::Object(entry) => FailureRecord {
            file_name: first_text(entry, &["fileName", "filename", "file"]),
            error: first_text(entry, &["error", "message", "reason", "status"])
                .unwrap_or_else(|| "unknown error".to_string()),
        },
        Value::String(s) => FailureRecord {
            file_name: Some(s.clone()),
            error: "unknown error".to_string(),
        },
        other => FailureRecord {
            file_name: None,
            error: other.to_string(),
        },
    }
}

fn quality_record(value: &Value) -> Option<QualityRecord> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(QualityRecord {
            issue: s.trim().to_string(),
            ..Default::default()
        }),
        Value::Object(entry) => Some(QualityRecord {
            file_name: first_text(entry, &["fileName", "filename", "file"]),
            issue: first_text(entry, &["issue", "message", "description", "type"])?,
            confidence: entry.get("confidence").map(amount),
        }),
        _ => None,
    }
}

fn duplicate_record(value: &Value) -> Option<DuplicateRecord> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(DuplicateRecord {
            file_names: vec![s.trim().to_string()],
            ..Default::default()
        }),
        Value::Object(entry) => {
            let file_names: Vec<String> = first_array(entry, &["fileNames", "files"])
                .map(|files| {
                    files
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .or_else(|| first_text(entry, &["fileName", "filename"]).map(|f| vec![f]))
                .unwrap_or_default();
            let invoice_number = first_text(entry, &["invoiceNumber", "invoice_number"]);
            if file_names.is_empty() && invoice_number.is_none() {
                return None;
            }
            Some(DuplicateRecord {
                file_names,
                invoice_number,
                reason: first_text(entry, &["reason", "message"]),
            })
        }
        _ => None,
    }
}

fn financial_summary(obj: &Map<String, Value>, fallback_count: usize) -> FinancialSummary {
    let field = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| obj.get(*k))
            .map(amount)
            .unwrap_or_default()
    };
    FinancialSummary {
        min: field(&["min", "minimum", "minAmount"]),
        max: field(&["max", "maximum", "maxAmount"]),
        avg: field(&["avg", "average", "mean", "averageAmount"]),
        median: field(&["median", "medianAmount"]),
        count: first_count(obj, &["count", "totalInvoices", "invoiceCount"]).unwrap_or(fallback_count),
    }
}

fn recommendation_list(value: &Value) -> Vec<String> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Object(o) => first_text(o, &["message", "text", "recommendation", "description"]),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect()
}

/// Numeric value from a JSON number or a currency string
fn amount(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or_default(),
        Value::String(s) => parse_currency(s),
        _ => 0.0,
    }
}

fn first_count(obj: &Map<String, Value>, keys: &[&str]) -> Option<usize> {
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn first_array<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Vec<Value>> {
    keys.iter().find_map(|k| obj.get(*k)?.as_array())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn enhanced_body() -> Value {
        json!({
            "summary": {"totalFiles": 3},
            "financialSummary": {
                "min": "$120.00",
                "max": "$1,234.56",
                "avg": "$677.28",
                "median": "677.28",
                "count": 2
            },
            "processingDetails": [
                {"fileName": "a.pdf", "status": "success", "confidence": 0.97,
                 "extractedData": {"invoiceNumber": "INV-1", "vendor": "Acme", "total": "$120.00", "currency": "USD"}},
                {"fileName": "b.pdf", "status": "completed",
                 "extractedData": {"invoiceNumber": "INV-2", "vendorName": "Globex", "totalAmount": 1234.56}},
                {"fileName": "c.pdf", "status": "error", "error": "unreadable scan"}
            ],
            "qualityMetrics": {
                "issues": [{"fileName": "a.pdf", "issue": "low contrast", "confidence": 0.6}, "blurry page"],
                "duplicates": [{"fileNames": ["a.pdf", "d.pdf"], "invoiceNumber": "INV-1"}]
            },
            "recommendations": ["Rescan c.pdf", {"message": "Enable auto-rotate"}]
        })
    }

    #[test]
    fn test_parse_currency() {
        assert_eq!(parse_currency("$1,234.56"), 1234.56);
        assert_eq!(parse_currency("-€12.50"), -12.5);
        assert_eq!(parse_currency("N/A"), 0.0);
        assert_eq!(parse_currency(""), 0.0);
        assert_eq!(parse_currency("1.2.3"), 0.0);
    }

    #[test]
    fn test_flattened_shape() {
        let summary = aggregate(&enhanced_body()).unwrap();
        assert_eq!(summary.total_items, 3);
        assert_eq!(summary.successful_extractions.len(), 2);
        assert_eq!(summary.successful_extractions[0].total, Some(120.0));
        assert_eq!(summary.successful_extractions[0].confidence, Some(0.97));
        assert_eq!(summary.successful_extractions[1].vendor.as_deref(), Some("Globex"));
        assert_eq!(summary.successful_extractions[1].total, Some(1234.56));
        assert_eq!(summary.failed_extractions.len(), 1);
        assert_eq!(summary.failed_extractions[0].error, "unreadable scan");
        assert_eq!(summary.quality_issues.len(), 2);
        assert_eq!(summary.quality_issues[1].issue, "blurry page");
        assert_eq!(summary.duplicates[0].file_names, vec!["a.pdf", "d.pdf"]);
        assert_eq!(summary.financial_summary.max, 1234.56);
        assert_eq!(summary.financial_summary.min, 120.0);
        assert_eq!(summary.financial_summary.count, 2);
        assert_eq!(summary.recommendations, vec!["Rescan c.pdf", "Enable auto-rotate"]);
        assert!(!summary.has_count_discrepancy());
    }

    #[test]
    fn test_legacy_shape_matches_flattened() {
        let legacy = json!({"results": [enhanced_body()]});
        assert_eq!(aggregate(&legacy), aggregate(&enhanced_body()));
        let wrapped = json!([{"json": {"results": [enhanced_body()]}}]);
        assert_eq!(aggregate(&wrapped), aggregate(&enhanced_body()));
    }

    #[test]
    fn test_missing_shapes_return_none() {
        assert!(aggregate(&json!({"success": true, "processed": 4})).is_none());
        assert!(aggregate(&json!({"results": [{"id": 1}]})).is_none());
        assert!(aggregate(&json!([])).is_none());
        assert!(aggregate(&json!("plain text")).is_none());
    }

    #[test]
    fn test_basic_payload_with_loose_keys_is_not_enhanced() {
        let basic = json!({"success": true, "message": "Batch queued", "summary": "3 files queued", "batchId": "b-3"});
        assert!(aggregate(&basic).is_none());
        assert_eq!(basic_summary(&basic).batch_id.as_deref(), Some("b-3"));

        assert!(aggregate(&json!({"summary": {"totalFiles": 3}})).is_none());
        assert!(aggregate(&json!({"financialSummary": "n/a", "processingDetails": []})).is_none());
        assert!(aggregate(&json!({"results": [{"processingDetails": "pending"}]})).is_none());
        assert!(aggregate(&json!({"processingDetails": []})).is_some());
    }

    #[test]
    fn test_discrepancy_is_preserved() {
        let payload = json!({
            "financialSummary": {"count": "5", "avg": "abc"},
            "processingDetails": [{"fileName": "x.pdf", "status": "success"}]
        });
        let summary = aggregate(&payload).unwrap();
        assert_eq!(summary.financial_summary.count, 5);
        assert_eq!(summary.successful_extractions.len(), 1);
        assert!(summary.has_count_discrepancy());
        assert_eq!(summary.financial_summary.avg, 0.0);
        assert!(!summary.financial_summary.avg.is_nan());
    }

    #[test]
    fn test_explicit_extraction_lists_win() {
        let payload = json!({
            "summary": {
                "successfulExtractions": [{"fileName": "z.pdf", "invoiceNumber": "Z-9", "total": "$10"}],
                "failedExtractions": ["y.pdf"]
            },
            "processingDetails": []
        });
        let summary = aggregate(&payload).unwrap();
        assert_eq!(summary.successful_extractions[0].invoice_number.as_deref(), Some("Z-9"));
        assert_eq!(summary.successful_extractions[0].total, Some(10.0));
        assert_eq!(summary.failed_extractions[0].file_name.as_deref(), Some("y.pdf"));
        assert_eq!(summary.total_items, 2);
        assert_eq!(summary.financial_summary.count, 1);
    }

    #[test]
    fn test_basic_summary() {
        let basic = basic_summary(&json!([{"json": {"success": true, "processed": "4", "failed": 1, "batchId": "b-7"}}]));
        assert!(basic.success);
        assert_eq!(basic.processed, 4);
        assert_eq!(basic.failed, 1);
        assert_eq!(basic.batch_id.as_deref(), Some("b-7"));

        let by_status = basic_summary(&json!({"status": "Completed"}));
        assert!(by_status.success);
        assert_eq!(by_status.message.as_deref(), Some("Completed"));
    }
}
