//! `keel fencing`: fencing topology for a set of remote members

use keel_plan::{fencing_topology, IsolationMode};

/// `fencing_topology` command, or a note when fencing is unmanaged
pub fn fencing(mode: &IsolationMode, fence: Option<&str>, members: &[String]) -> String {
    match fencing_topology(mode, members, fence) {
        Some(topology) => topology.render(),
        None => format!("# fencing not managed in {} mode", mode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members() -> Vec<String> {
        vec!["r1".to_string(), "r2".to_string()]
    }

    #[test]
    fn test_per_node_topology() {
        assert_eq!(
            fencing(&IsolationMode::PerNode, Some("fence-nova"), &members()),
            "fencing_topology remote-r1: stonith-remote-r1,fence-nova \
             remote-r2: stonith-remote-r2,fence-nova"
        );
    }

    #[test]
    fn test_custom_mode_from_cli_value() {
        let mode: IsolationMode = "custom:my-ipmi".parse().unwrap();
        assert_eq!(
            fencing(&mode, None, &members()),
            "fencing_topology remote-r1: my-ipmi remote-r2: my-ipmi"
        );
    }

    #[test]
    fn test_manual_mode() {
        assert_eq!(
            fencing(&IsolationMode::Manual, Some("fence-nova"), &members()),
            "# fencing not managed in manual mode"
        );
    }
}
