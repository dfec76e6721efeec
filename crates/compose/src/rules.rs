use models::{AlertRuleNode, GroupKey, Rule, RuleGroupDocument, Template};
use std::collections::BTreeMap;

/// Build the desired remote state of one rule group from its stored
/// rules. Disabled rules contribute nothing; the remaining rules render
/// in name order, each through its template, and their parsed alert
/// nodes accumulate into the document in that order.
///
/// Any per-rule failure aborts the whole group. Partial documents are
/// never produced.
pub fn rule_group(
    key: &GroupKey,
    rules: &[Rule],
    templates: &BTreeMap<String, Template>,
) -> Result<RuleGroupDocument, crate::Error> {
    let mut ordered: Vec<&Rule> = rules.iter().filter(|rule| rule.enabled).collect();
    ordered.sort_by(|a, b| a.name.cmp(&b.name));

    let mut nodes: Vec<AlertRuleNode> = Vec::new();
    // Alert name -> name of the rule which produced it.
    let mut produced: BTreeMap<String, &str> = BTreeMap::new();

    for rule in ordered {
        let Some(tpl) = templates.get(&rule.template) else {
            return Err(crate::Error::TemplateNotFound {
                rule: rule.name.clone(),
                template: rule.template.clone(),
            });
        };

        let vars =
            template::merge(&tpl.variables, &rule.variables).map_err(|source| crate::Error::Merge {
                rule: rule.name.clone(),
                source,
            })?;
        let body =
            template::render(&tpl.body, &vars).map_err(|source| crate::Error::Render {
                rule: rule.name.clone(),
                template: rule.template.clone(),
                source,
            })?;
        let fragment: Vec<AlertRuleNode> =
            serde_yaml::from_str(&body).map_err(|source| crate::Error::Fragment {
                rule: rule.name.clone(),
                source,
            })?;

        for node in fragment {
            if let Some(prior) = produced.insert(node.alert.clone(), rule.name.as_str()) {
                return Err(crate::Error::DuplicateAlert {
                    alert: node.alert,
                    lhs: prior.to_string(),
                    rhs: rule.name.clone(),
                });
            }
            nodes.push(node);
        }
    }

    Ok(RuleGroupDocument {
        tenant: key.tenant.clone(),
        namespace: key.namespace.clone(),
        group: key.group.clone(),
        nodes,
    })
}
