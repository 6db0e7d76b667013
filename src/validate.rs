use crate::chart::ChartDescriptor;
use crate::error::ValidationError;
use crate::mapping::Mapping;

/// Check a mapping against the chart's dimension requirements.
///
/// Checks run in a fixed order and the first failure wins: completeness of required
/// dimensions, minimum cardinality of multi-valued dimensions, then type compatibility.
pub fn validate(chart: &ChartDescriptor, mapping: &Mapping) -> Result<(), ValidationError> {
    // 1. Completeness
    let missing: Vec<String> = chart
        .dimensions()
        .iter()
        .filter(|d| d.required)
        .filter(|d| !mapping.get(&d.id).is_some_and(|e| e.is_mapped()))
        .map(|d| d.id.clone())
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingRequiredDimension(missing));
    }

    // 2. Minimum cardinality
    for dim in chart.dimensions().iter().filter(|d| d.required && d.multiple) {
        if let Some(required) = dim.min_values {
            let actual = mapping.columns(&dim.id).len();
            if actual < required {
                return Err(ValidationError::InsufficientMultiValueMapping {
                    dimension: dim.id.clone(),
                    required,
                    actual,
                });
            }
        }
    }

    // 3. Type compatibility
    for dim in chart.dimensions() {
        if let Some(entry) = mapping.get(&dim.id) {
            if entry.is_mapped() && !entry.is_valid {
                return Err(ValidationError::TypeMismatch {
                    dimension: dim.id.clone(),
                    name: dim.name.clone(),
                    mapped_type: entry.mapped_type,
                });
            }
        }
    }

    Ok(())
}
