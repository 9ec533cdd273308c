//! `keel plan`: print the crm script a founder would commit

use std::collections::BTreeSet;
use std::path::Path;

use keel_plan::{
    render_definition, render_transaction, ComputeHaPlan, ComputeHaSettings, DatabaseHaPlan,
    DatabaseHaSettings,
};
use tracing::info;

use super::ServiceKind;
use crate::document;
use crate::error::CliResult;

/// Render the plan for a settings document
///
/// `existing` lists resources already defined in the cluster; it decides
/// which upstream resources the compute evacuation order refers to.
pub fn plan(kind: ServiceKind, settings: &Path, existing: &[String]) -> CliResult<String> {
    match kind {
        ServiceKind::Database => {
            let settings: DatabaseHaSettings = document::load(settings)?;
            let plan = DatabaseHaPlan::build(&settings)?;
            info!(vhostname = %plan.vhostname, "Database plan built");
            Ok(render_transaction(&plan.transaction))
        }
        ServiceKind::Compute => {
            let settings: ComputeHaSettings = document::load(settings)?;
            let existing: BTreeSet<String> = existing.iter().cloned().collect();
            let plan = ComputeHaPlan::build(&settings, &existing)?;

            let mut script = render_transaction(&plan.compute);
            script.push_str(&render_transaction(&plan.controller));
            if let Some(fencing) = &plan.fencing {
                script.push_str(&fencing.render());
                script.push('\n');
            }
            if let Some(order) = &plan.evacuate_order {
                script.push_str(&render_definition(order));
                script.push('\n');
            }
            Ok(script)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_database_plan_script() {
        let settings = file(
            "role_name: database-config-default\ncluster: data\nvip_address: 192.168.124.200\n",
        );
        let script = plan(ServiceKind::Database, settings.path(), &[]).unwrap();
        assert!(script.starts_with("# database service\n"));
        assert!(script.contains("192.168.124.200"));
    }

    #[test]
    fn test_compute_plan_script() {
        let settings = file(
            r#"
keystone:
  internal_auth_url: http://keystone:5000/v3
  admin_user: admin
  admin_password: secret
  admin_tenant: openstack
neutron:
  ml2_mechanism_drivers: [openvswitch]
domain: cloud.example.com
remote_members: [r1, r2]
isolation_mode: shared
"#,
        );
        let script = plan(
            ServiceKind::Compute,
            settings.path(),
            &["rabbitmq".to_string()],
        )
        .unwrap();
        assert!(script.contains("# compute\n"));
        assert!(script.contains("# compute (non-remote bits)\n"));
        assert!(script.contains("fencing_topology remote-r1: stonith-shared,fence-nova"));
        assert!(script.contains("rabbitmq nova-evacuate"));
    }
}
