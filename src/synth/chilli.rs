//! CoovaChilli per-interface snippets.

use super::InterfacePlan;

/// Snippet for a plan that serves DHCP, `None` otherwise.
pub fn render(plan: &InterfacePlan) -> Option<String> {
    let network = plan.dhcp_network.as_deref()?;
    Some(format!(
        "# CoovaChilli config for {name}\nhs_wanif={name}\nhs_lanif={name}\nhs_network={network}\n",
        name = plan.name,
        network = network,
    ))
}
