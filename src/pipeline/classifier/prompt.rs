use crate::pipeline::taxonomy::WasteCategory;
use serde_json::{Value, json};

/// Instruction text sent with every image.
pub fn instruction_text() -> String {
    let mut text = String::from(
        "You are a waste classification assistant. Look at the photo and classify the \
         main item into exactly one of these six categories. Each category has exactly \
         one correct disposal method:\n",
    );
    for category in WasteCategory::ALL {
        text.push_str(&format!(
            "{}. {} -> {}\n",
            category.ordinal(),
            category.label(),
            category.disposal_method()
        ));
    }
    text.push_str(
        "\nRespond only with JSON containing: \"waste_type\" (one of the category names \
         above, spelled exactly), \"confidence\" (a number between 0 and 1), \"reasoning\" \
         (one sentence explaining the decision) and \"disposal_method\" (the disposal \
         method paired with the chosen category, spelled exactly).",
    );
    text
}

/// Response schema directive: four required fields, labels and methods as enums.
pub fn response_schema() -> Value {
    let labels: Vec<&str> = WasteCategory::labels().collect();
    let methods: Vec<&str> = WasteCategory::disposal_methods().collect();
    json!({
        "type": "OBJECT",
        "properties": {
            "waste_type": { "type": "STRING", "enum": labels },
            "confidence": { "type": "NUMBER" },
            "reasoning": { "type": "STRING" },
            "disposal_method": { "type": "STRING", "enum": methods }
        },
        "required": ["waste_type", "confidence", "reasoning", "disposal_method"],
        "propertyOrdering": ["waste_type", "confidence", "reasoning", "disposal_method"]
    })
}
