//! crm shell rendering
//!
//! Renders resource definitions in the syntax accepted by
//! `crm configure load update -`, one object per line.

use std::collections::BTreeMap;

use keel_types::{Operations, ResourceDefinition, ResourceSpec, Transaction};

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn pairs(keyword: &str, values: &BTreeMap<String, String>, quoted: bool) -> Option<String> {
    if values.is_empty() {
        return None;
    }
    let rendered: Vec<String> = values
        .iter()
        .map(|(k, v)| {
            if quoted {
                format!("{}={}", k, quote(v))
            } else {
                format!("{}={}", k, v)
            }
        })
        .collect();
    Some(format!("{} {}", keyword, rendered.join(" ")))
}

fn operations(ops: &Operations) -> Vec<String> {
    ops.iter()
        .map(|(name, spec)| {
            let mut line = format!("op {}", name);
            if let Some(interval) = &spec.interval {
                line.push_str(&format!(" interval={}", interval));
            }
            if let Some(timeout) = &spec.timeout {
                line.push_str(&format!(" timeout={}", timeout));
            }
            line
        })
        .collect()
}

/// One crm configure statement
pub fn render_definition(definition: &ResourceDefinition) -> String {
    match &definition.spec {
        ResourceSpec::Primitive {
            id,
            agent,
            params,
            ops,
            meta,
        } => {
            let mut parts = vec![format!("primitive {} {}", id, agent)];
            parts.extend(pairs("params", params, true));
            parts.extend(operations(ops));
            parts.extend(pairs("meta", meta, false));
            parts.join(" \\\n    ")
        }
        ResourceSpec::Group { id, members } => format!("group {} {}", id, members.join(" ")),
        ResourceSpec::Clone { id, target, meta } => {
            let mut parts = vec![format!("clone {} {}", id, target)];
            parts.extend(pairs("meta", meta, false));
            parts.join(" ")
        }
        ResourceSpec::MultiState { id, target, meta } => {
            let mut parts = vec![format!("ms {} {}", id, target)];
            parts.extend(pairs("meta", meta, false));
            parts.join(" ")
        }
        ResourceSpec::Location { definition, .. } => definition.clone(),
        ResourceSpec::Colocation {
            id,
            score,
            resources,
        } => format!("colocation {} {}: {}", id, score, resources.join(" ")),
        ResourceSpec::Order {
            id,
            score,
            ordering,
        } => format!("order {} {}: {}", id, score, ordering),
    }
}

/// Every statement of a transaction, in order
pub fn render_transaction(transaction: &Transaction) -> String {
    let mut script = format!("# {}\n", transaction.name);
    for definition in &transaction.objects {
        script.push_str(&render_definition(definition));
        script.push('\n');
    }
    script
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_types::OpSpec;

    #[test]
    fn test_render_primitive() {
        let mut ops = Operations::new();
        ops.insert("monitor".into(), OpSpec::interval("10s"));
        let def = ResourceDefinition::new(ResourceSpec::Primitive {
            id: "vip-admin-db".into(),
            agent: "ocf:heartbeat:IPaddr2".into(),
            params: [("ip".to_string(), "10.0.0.10".to_string())].into(),
            ops,
            meta: BTreeMap::new(),
        });

        assert_eq!(
            render_definition(&def),
            "primitive vip-admin-db ocf:heartbeat:IPaddr2 \\\n    params ip=\"10.0.0.10\" \\\n    op monitor interval=10s"
        );
    }

    #[test]
    fn test_render_constraints() {
        let ms = ResourceDefinition::new(ResourceSpec::MultiState {
            id: "ms-postgresql".into(),
            target: "postgresql".into(),
            meta: [("notify".to_string(), "true".to_string())].into(),
        });
        assert_eq!(render_definition(&ms), "ms ms-postgresql postgresql meta notify=true");

        let col = ResourceDefinition::new(ResourceSpec::Colocation {
            id: "col-ms-postgresql".into(),
            score: "inf".into(),
            resources: vec!["vip-admin-db".into(), "ms-postgresql:Master".into()],
        });
        assert_eq!(
            render_definition(&col),
            "colocation col-ms-postgresql inf: vip-admin-db ms-postgresql:Master"
        );

        let tx = Transaction::new("database service", vec![ms, col]).unwrap();
        let script = render_transaction(&tx);
        assert!(script.starts_with("# database service\nms ms-postgresql"));
        assert_eq!(script.lines().count(), 3);
    }

    #[test]
    fn test_params_are_quoted() {
        assert_eq!(quote(r#"pa"ss"#), r#""pa\"ss""#);
    }
}
