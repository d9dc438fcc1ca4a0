//! Subcommand handlers

use crate::config::cli::{Command, SetupTarget, ShowTarget};
use crate::config::{AppConfig, GatewayConfig, GatewayDecl};
use crate::error::{AppError, TopologyError};
use crate::network::{HostLink, LinkSource};
use crate::routing::manager::{ApplyReport, CommandExecutor, CommandRunner};
use crate::routing::planner::RoutePlanner;
use crate::routing::RoutePlan;
use crate::topology::{Gateway, TopologyContext};
use tracing::{error, info, warn};

/// One run: configuration, topology and the executor applying plans
pub struct Session<R> {
    app: AppConfig,
    config: GatewayConfig,
    topology: TopologyContext,
    executor: CommandExecutor<R>,
}

impl<R: CommandRunner + Sync> Session<R> {
    pub fn new(
        app: AppConfig,
        config: GatewayConfig,
        host_links: Vec<HostLink>,
        runner: R,
    ) -> Result<Self, AppError> {
        let topology = TopologyContext::build(&config, host_links)?;
        Ok(Self {
            app,
            config,
            topology,
            executor: CommandExecutor::new(runner),
        })
    }

    /// Load configuration and host links, then build the session
    pub async fn load<L: LinkSource>(app: AppConfig, links: &L, runner: R) -> Result<Self, AppError> {
        let config = app.load_gateway_config()?;
        let host_links = links.list_links().await?;
        Self::new(app, config, host_links, runner)
    }

    pub fn topology(&self) -> &TopologyContext {
        &self.topology
    }

    pub fn executor(&self) -> &CommandExecutor<R> {
        &self.executor
    }

    pub fn plan(&self) -> Result<RoutePlan, TopologyError> {
        RoutePlanner::new(&self.topology).plan(&self.config.route_tables, &self.config.route_rules)
    }

    pub async fn run(&self, command: &Command) -> Result<(), AppError> {
        match command {
            Command::Setup { target } => self.setup(*target).await,
            Command::Ifup { iface } => {
                let iface = iface.clone().or_else(|| std::env::var("IFACE").ok());
                self.ifup(iface.as_deref()).await
            }
            Command::Show { what } => {
                print!("{}", self.show(*what)?);
                Ok(())
            }
            Command::Check => self.check().map(|_| ()),
        }
    }

    pub async fn setup(&self, target: SetupTarget) -> Result<(), AppError> {
        if matches!(target, SetupTarget::Firewall | SetupTarget::All) {
            self.setup_firewall().await?;
        }
        if matches!(target, SetupTarget::Route | SetupTarget::All) {
            self.setup_route().await?;
        }
        Ok(())
    }

    pub async fn setup_firewall(&self) -> Result<bool, AppError> {
        info!("running setup_firewall()");
        let script = self
            .config
            .firewall_script
            .clone()
            .unwrap_or_else(|| self.app.default_firewall_script());

        if !script.is_file() {
            warn!("firewall script not found: {}, skipped", script.display());
            return Ok(false);
        }
        Ok(self.executor.load_nft_script(&script).await?)
    }

    pub async fn setup_route(&self) -> Result<ApplyReport, AppError> {
        info!("running setup_route()");
        let plan = self.plan()?;
        let report = self.executor.apply(&plan).await?;

        if report.failed > 0 {
            error!(
                "{} of {} commands failed while applying routes",
                report.failed, report.commands
            );
        } else {
            info!("Applied {} route commands", report.commands);
        }
        Ok(report)
    }

    /// Interface hook: set the configured device group, then set everything up
    pub async fn ifup(&self, iface: Option<&str>) -> Result<(), AppError> {
        let Some(name) = iface else {
            warn!("no interface given and IFACE is not set");
            return Ok(());
        };

        let interface = self.topology.interfaces().get(name);
        let Some(interface) = interface.filter(|interface| interface.exists()) else {
            error!("interface not found on host: {}", name);
            return Ok(());
        };

        if let Some(group) = interface.configured_devgroup() {
            info!("setting iface group, iface={} group={}", name, group);
            self.executor.set_link_group(name, group).await?;
        }

        self.setup(SetupTarget::All).await
    }

    /// Resolve every gateway and plan, reporting diagnostics
    pub fn check(&self) -> Result<RoutePlan, AppError> {
        self.topology.resolve_all()?;
        let plan = self.plan()?;

        // each diagnostic was already logged by the planner
        let skipped = plan.diagnostics.iter().filter(|d| !d.is_warning()).count();
        info!(
            "configuration ok: {} interfaces, {} gateways, {} netzones, {} operations, {} entries skipped",
            self.topology.interfaces().len(),
            self.topology.gateways.len(),
            self.topology.netzones.len(),
            plan.operations.len(),
            skipped
        );
        Ok(plan)
    }

    pub fn show(&self, what: ShowTarget) -> Result<String, AppError> {
        let lines: Vec<String> = match what {
            ShowTarget::Interfaces => self
                .topology
                .interfaces()
                .iter()
                .map(|interface| interface.to_string())
                .collect(),
            ShowTarget::Gateways => self
                .topology
                .gateways
                .iter()
                .map(|gateway| self.describe_gateway(gateway))
                .collect::<Result<_, _>>()?,
            ShowTarget::Netzones => self
                .topology
                .netzones
                .zones()
                .iter()
                .map(|zone| zone.to_string())
                .collect(),
            ShowTarget::Plan => {
                let plan = self.plan()?;
                plan.operations
                    .iter()
                    .map(|operation| operation.to_string())
                    .chain(plan.diagnostics.iter().map(|d| format!("# {}", d)))
                    .collect()
            }
        };
        Ok(lines.into_iter().map(|line| line + "\n").collect())
    }

    fn describe_gateway(&self, gateway: &Gateway) -> Result<String, TopologyError> {
        let Some(resolution) = self.topology.gateways.resolve(gateway.name())? else {
            return Ok(format!("<Gateway name={}>", gateway.name()));
        };

        let interfaces = resolution.next_hop.interfaces().join(",");
        let mode = match gateway.decl() {
            GatewayDecl::Multi(_) => "interfaces",
            GatewayDecl::Alias(_) if interfaces.contains(',') => "interfaces",
            _ => "interface",
        };
        Ok(format!(
            "<Gateway name={} {}={} available={} link={} config={} nexthop=\"{}\">",
            gateway.name(),
            mode,
            interfaces,
            resolution.available,
            gateway.link().unwrap_or("None"),
            if gateway.user_configured() { "yes" } else { "no" },
            resolution.next_hop
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::toml::parse_toml_config;
    use crate::error::RouteError;
    use crate::network::StaticLinkSource;
    use crate::routing::manager::CommandOutput;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        lines: Mutex<Vec<String>>,
    }

    impl CommandRunner for Recorder {
        async fn run(
            &self,
            program: &str,
            args: &[String],
            stdin: Option<&str>,
        ) -> Result<CommandOutput, RouteError> {
            let mut lines = self.lines.lock().unwrap();
            lines.push(format!("{} {}", program, args.join(" ")));
            if let Some(data) = stdin {
                lines.extend(data.lines().map(|line| format!("  {}", line)));
            }
            Ok(CommandOutput {
                success: true,
                ..CommandOutput::default()
            })
        }
    }

    const CONFIG: &str = r#"
[interfaces.eth0]
devgroup = "wan"
gateway = "203.0.113.1"

[interfaces.ppp0]
devgroup = "tunnel"

[gateways.wan]
interface = "eth0"

[gateways.backup]
interface = "ppp0"

[gateways.uplink]
link = "wan"

[gateways.bond]
interfaces = ["eth0", "eth1"]

[routing]
rules = ["from 10.0.0.0/8 lookup 100 pref 100"]

[[routing.tables]]
name = "100"
entries = [["0.0.0.0/0", "uplink"], ["10.1.0.0/16", "backup"]]
"#;

    fn session(data_dir: &Path, links: Vec<HostLink>) -> Session<Recorder> {
        let app = AppConfig {
            data_dir: data_dir.to_path_buf(),
            ..AppConfig::default()
        };
        let config =
            GatewayConfig::from_toml(parse_toml_config(CONFIG).unwrap(), &app.builtin_netzones())
                .unwrap();
        Session::new(app, config, links, Recorder::default()).unwrap()
    }

    fn recorded(session: &Session<Recorder>) -> Vec<String> {
        session.executor().runner().lines.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_setup_route_applies_plan() {
        let data = tempfile::tempdir().unwrap();
        let session = session(data.path(), vec![HostLink::new("eth0", 2)]);

        let report = session.setup_route().await.unwrap();
        assert_eq!(report.failed, 0);

        let lines = recorded(&session);
        assert_eq!(lines[0], "ip route delete default table main");
        assert_eq!(lines[1], "ip route flush table 100");
        assert_eq!(lines[2], "ip -force -batch -");
        assert_eq!(
            lines[3],
            "  route replace table 100 0.0.0.0/0 via 203.0.113.1 dev eth0"
        );
        assert_eq!(lines[4], "ip rule flush");
        assert!(lines.contains(&"  rule add from 10.0.0.0/8 lookup 100 pref 100".to_string()));
    }

    #[tokio::test]
    async fn test_setup_firewall_uses_builtin_script() {
        let data = tempfile::tempdir().unwrap();
        let session = session(data.path(), vec![]);

        // no script installed yet
        assert!(!session.setup_firewall().await.unwrap());

        let nft_dir = data.path().join("nftables");
        std::fs::create_dir_all(&nft_dir).unwrap();
        std::fs::write(nft_dir.join("firewall.nft"), "flush ruleset\n").unwrap();

        assert!(session.setup_firewall().await.unwrap());
        let lines = recorded(&session);
        assert_eq!(
            lines,
            vec![format!(
                "/usr/sbin/nft -f {}",
                nft_dir.join("firewall.nft").display()
            )]
        );
    }

    #[tokio::test]
    async fn test_ifup_sets_devgroup_then_routes() {
        let data = tempfile::tempdir().unwrap();
        let session = session(
            data.path(),
            vec![HostLink::new("eth0", 2), HostLink::new("ppp0", 5)],
        );

        session.ifup(Some("ppp0")).await.unwrap();

        let lines = recorded(&session);
        assert_eq!(lines[0], "ip link set dev ppp0 group 4");
        assert!(lines.contains(&"ip route flush table 100".to_string()));
        assert!(lines.contains(&"  route replace table 100 10.1.0.0/16 dev ppp0".to_string()));
    }

    #[tokio::test]
    async fn test_ifup_absent_interface_is_noop() {
        let data = tempfile::tempdir().unwrap();
        let session = session(data.path(), vec![HostLink::new("eth0", 2)]);

        session.ifup(Some("ppp0")).await.unwrap();
        session.ifup(Some("nonexistent")).await.unwrap();
        session.ifup(None).await.unwrap();

        assert!(recorded(&session).is_empty());
    }

    #[test]
    fn test_check_reports_skipped_entries() {
        let data = tempfile::tempdir().unwrap();
        let session = session(data.path(), vec![HostLink::new("eth0", 2)]);

        let plan = session.check().unwrap();
        assert!(plan.has_errors());
        assert_eq!(plan.routes_for("100").count(), 1);
        // the plan check returns is the one show prints, diagnostics included once
        assert_eq!(plan.diagnostics.len(), 1);
        assert_eq!(plan, session.plan().unwrap());
    }

    #[test]
    fn test_show_one_line_per_item() {
        let data = tempfile::tempdir().unwrap();
        let zones = data.path().join("netzones");
        std::fs::create_dir_all(&zones).unwrap();
        std::fs::write(zones.join("corp.txt"), "10.0.0.0/8\n").unwrap();
        std::fs::write(zones.join("lab.txt"), "192.0.2.0/24\n").unwrap();
        let session = session(data.path(), vec![HostLink::new("eth0", 2)]);

        let interfaces = session.show(ShowTarget::Interfaces).unwrap();
        assert_eq!(interfaces.lines().count(), 2);
        assert!(interfaces.ends_with('\n'));
        assert!(interfaces.lines().next().unwrap().starts_with("<Interface ifname=eth0"));

        let netzones = session.show(ShowTarget::Netzones).unwrap();
        assert_eq!(netzones.lines().count(), 2);
        assert!(netzones.ends_with('\n'));

        let plan = session.show(ShowTarget::Plan).unwrap();
        let expected = session.plan().unwrap();
        assert_eq!(
            plan.lines().count(),
            expected.operations.len() + expected.diagnostics.len()
        );
    }

    #[test]
    fn test_show_gateways() {
        let data = tempfile::tempdir().unwrap();
        let session = session(data.path(), vec![HostLink::new("eth0", 2)]);

        let out = session.show(ShowTarget::Gateways).unwrap();
        assert!(out.contains(
            "<Gateway name=uplink interface=eth0 available=true link=wan config=yes nexthop=\"via 203.0.113.1 dev eth0\">"
        ));
        assert!(out.contains("<Gateway name=bond interfaces=eth0,eth1 available=false"));
        assert!(out.contains("<Gateway name=ppp0 interface=ppp0 available=false link=None config=no"));
    }

    #[test]
    fn test_show_plan_lists_diagnostics() {
        let data = tempfile::tempdir().unwrap();
        let session = session(data.path(), vec![HostLink::new("eth0", 2)]);

        let out = session.show(ShowTarget::Plan).unwrap();
        assert!(out.starts_with("route delete default table main\n"));
        assert!(out.contains("# gateway is not available in route table 100: backup, rule skipped"));
    }

    #[tokio::test]
    async fn test_load_from_link_source() {
        let workspace = tempfile::tempdir().unwrap();
        let configs = workspace.path().join("configs");
        std::fs::create_dir_all(&configs).unwrap();
        std::fs::write(configs.join("gateway.toml"), CONFIG).unwrap();

        let app = AppConfig {
            workspace: workspace.path().to_path_buf(),
            data_dir: workspace.path().join("share"),
            ..AppConfig::default()
        };
        let links = StaticLinkSource::new(vec![HostLink::new("eth0", 2)]);

        let session = Session::load(app, &links, Recorder::default()).await.unwrap();
        assert!(session.topology().gateways.get("uplink").is_some());
        assert!(session.topology().interfaces().exists("eth0"));
    }
}
