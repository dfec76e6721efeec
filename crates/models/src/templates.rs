use serde::{Deserialize, Serialize};

/// Template is a reusable, parameterized definition of one or more alert
/// rules. Its body is YAML text in which `[[ .variable ]]` placeholders
/// stand in for values that are bound per rule.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Template {
    /// Name of this template, unique within the service.
    pub name: String,
    /// YAML body holding a list of alert rules, with placeholders.
    pub body: String,
    /// Free-form tags for discovery.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Variables which the body may reference, with their defaults.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<VariableSpec>,
}

/// VariableSpec declares one variable of a Template, together with the
/// default value used when a rule doesn't bind it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct VariableSpec {
    pub name: String,
    /// Advisory type of this variable, such as "string" or "int".
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub type_: String,
    #[serde(default)]
    pub default: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl Template {
    /// Structural validation of this Template. Whether its body actually
    /// renders is checked separately, at upsert time.
    pub fn validate(&self) -> Result<(), crate::Error> {
        crate::validate_token("template", &self.name)?;

        if self.body.trim().is_empty() {
            return Err(crate::Error::EmptyTemplateBody {
                name: self.name.clone(),
            });
        }
        for spec in &self.variables {
            crate::validate_token("variable", &spec.name)?;
        }
        Ok(())
    }
}
