//! CLI Tooling
//!
//! Command-line interface over the wired [`Services`]. Every command returns
//! its rendered output as a string; `--format json` switches from tables to
//! pretty-printed JSON.

use crate::agent::DocumentKind;
use crate::config::{ConfigLoader, FindocConfig};
use crate::error::OrchestratorError;
use crate::knowledge::{QueryMode, QueryParams};
use crate::logging::LoggingConfig;
use crate::orchestrator::{GlobalAgentResponse, RequestOptions};
use crate::router::RoutingDecision;
use crate::services::Services;
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::Table;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;

/// Findoc CLI - Multi-agent financial document generation
#[derive(Parser)]
#[command(name = "findoc")]
#[command(about = "Route requests to document agents and manage their knowledge stores")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (overrides default config loading)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate documents for a free-text request
    Generate {
        /// The request, e.g. "Create an investor summary for Acme notes linked to the S&P 500"
        request: String,
        /// Run these agents instead of routing (short or long names, first is primary)
        #[arg(long, value_delimiter = ',')]
        agents: Vec<String>,
        /// Run every agent, routed primary first
        #[arg(long)]
        all: bool,
        /// Build sectioned output from the large-text templates
        #[arg(long)]
        large_text: bool,
        /// Target audience for large-text templates
        #[arg(long)]
        audience: Option<String>,
        /// Extra template variable, NAME=VALUE (repeatable)
        #[arg(long = "var", value_parser = parse_variable)]
        variables: Vec<(String, String)>,
        /// Leave unfilled placeholders in large-text output
        #[arg(long)]
        allow_placeholders: bool,
        /// Write the primary document under the generated documents root
        #[arg(long)]
        save: bool,
    },
    /// Show how a request would be routed without generating anything
    Route {
        request: String,
    },
    /// Inspect registered agents
    Agents {
        #[command(subcommand)]
        command: AgentCommands,
    },
    /// Manage per-domain knowledge stores
    Knowledge {
        #[command(subcommand)]
        command: KnowledgeCommands,
    },
    /// Run agent health checks
    Monitor {
        #[command(subcommand)]
        command: MonitorCommands,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum AgentCommands {
    /// List registered agent types
    List,
    /// Registry status summary
    Status,
    /// Registry health for one agent type, or all of them
    Health {
        agent_type: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum KnowledgeCommands {
    /// Insert a document into a domain
    Insert {
        domain: String,
        /// Read content from a file
        #[arg(long, conflicts_with = "content")]
        file: Option<PathBuf>,
        /// Inline content
        #[arg(long)]
        content: Option<String>,
    },
    /// Query one domain
    Query {
        domain: String,
        query: String,
        /// local, global, hybrid, naive or mix
        #[arg(long, default_value = "mix")]
        mode: String,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },
    /// Query several domains concurrently
    CrossQuery {
        query: String,
        /// Domains to query (defaults to every document kind)
        #[arg(long, value_delimiter = ',')]
        domains: Vec<String>,
        #[arg(long, default_value = "mix")]
        mode: String,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },
    /// List known domains and their storage paths
    List,
}

#[derive(Subcommand)]
pub enum MonitorCommands {
    /// Run one health check round
    Check {
        agent_type: Option<String>,
    },
    /// Monitoring summary after a check round
    Summary,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
}

fn parse_variable(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{}'", raw)),
    }
}

/// Load configuration, applying any `--log-*` overrides.
pub fn load_config(cli: &Cli) -> Result<FindocConfig, OrchestratorError> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    apply_log_overrides(&mut config.logging, cli)?;
    Ok(config)
}

fn apply_log_overrides(logging: &mut LoggingConfig, cli: &Cli) -> Result<(), OrchestratorError> {
    if let Some(level) = &cli.log_level {
        logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        logging.format = format.parse()?;
    }
    if let Some(output) = &cli.log_output {
        logging.output = output.parse()?;
    }
    if let Some(file) = &cli.log_file {
        logging.file = Some(file.clone());
    }
    Ok(())
}

pub struct CliContext {
    services: Services,
    format: OutputFormat,
}

impl CliContext {
    pub fn new(config: FindocConfig, format: OutputFormat) -> Result<Self, OrchestratorError> {
        config.ensure_directories_exist()?;
        Ok(Self {
            services: Services::bootstrap(config)?,
            format,
        })
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub async fn execute(&self, command: &Commands) -> Result<String, OrchestratorError> {
        let result = match command {
            Commands::Generate {
                request,
                agents,
                all,
                large_text,
                audience,
                variables,
                allow_placeholders,
                save,
            } => {
                let options = RequestOptions {
                    agents: agents.clone(),
                    run_all: *all,
                    use_large_text_templates: *large_text,
                    audience: audience.clone(),
                    custom_variables: variables.iter().cloned().collect(),
                    enforce_placeholder_validation: !allow_placeholders,
                    ..RequestOptions::default()
                };
                let response = self
                    .services
                    .global_agent
                    .process_request(request, options)
                    .await;
                if *save {
                    self.save_primary(&response)?;
                }
                self.render(&response, format_generate)
            }
            Commands::Route { request } => {
                let decision = self.services.global_agent.router().analyze_request(request);
                self.render(&decision, format_route)
            }
            Commands::Agents { command } => self.execute_agents(command),
            Commands::Knowledge { command } => self.execute_knowledge(command).await,
            Commands::Monitor { command } => self.execute_monitor(command),
            Commands::Config {
                command: ConfigCommands::Show,
            } => {
                let mut shown = self.services.config.clone();
                if shown.openai.has_api_key() {
                    shown.openai.api_key = "********".to_string();
                }
                match self.format {
                    OutputFormat::Json => to_json(&shown),
                    OutputFormat::Text => toml::to_string_pretty(&shown)
                        .map_err(|e| OrchestratorError::ConfigError(e.to_string())),
                }
            }
        };
        self.services.shutdown();
        result
    }

    fn execute_agents(&self, command: &AgentCommands) -> Result<String, OrchestratorError> {
        let registry = &self.services.registry;
        match command {
            AgentCommands::List => {
                let agents: Vec<_> = registry
                    .list_agent_types()
                    .iter()
                    .filter_map(|t| registry.get_agent_metadata(t))
                    .collect();
                self.render(&agents, |agents| {
                    let mut table = table(vec!["Agent Type", "Class", "Status", "Version", "Description"]);
                    for a in agents {
                        table.add_row(vec![
                            a.agent_type.clone(),
                            a.class_name.clone(),
                            a.status.as_str().to_string(),
                            a.version.clone(),
                            a.description.clone(),
                        ]);
                    }
                    format!("{}\n\nTotal: {} agent(s)", table, agents.len())
                })
            }
            AgentCommands::Status => {
                let summary = registry.get_agent_status_summary();
                self.render(&summary, |s| {
                    let mut table = table(vec!["Agent Type", "Status", "Health", "Version", "Last Updated"]);
                    for (agent_type, entry) in &s.agents_by_type {
                        table.add_row(vec![
                            agent_type.clone(),
                            entry.status.as_str().to_string(),
                            entry.health.clone(),
                            entry.version.clone(),
                            entry.last_updated.clone(),
                        ]);
                    }
                    format!(
                        "{}\n\nTotal: {}  Available: {}  Shell: {}  Development: {}",
                        table, s.total_agents, s.available_agents, s.shell_agents, s.development_agents
                    )
                })
            }
            AgentCommands::Health { agent_type } => {
                let types = match agent_type {
                    Some(t) => vec![t.clone()],
                    None => registry.list_agent_types(),
                };
                let checks: Vec<_> = types.iter().map(|t| registry.check_agent_health(t)).collect();
                self.render(&checks, |checks| {
                    let mut table = table(vec!["Agent Type", "Status", "Error"]);
                    for c in checks {
                        table.add_row(vec![
                            c.agent_type.clone(),
                            c.status.clone(),
                            c.error.clone().unwrap_or_else(|| "-".to_string()),
                        ]);
                    }
                    table.to_string()
                })
            }
        }
    }

    async fn execute_knowledge(&self, command: &KnowledgeCommands) -> Result<String, OrchestratorError> {
        let knowledge = &self.services.knowledge;
        match command {
            KnowledgeCommands::Insert { domain, file, content } => {
                let text = match (file, content) {
                    (Some(path), _) => std::fs::read_to_string(path)?,
                    (None, Some(text)) => text.clone(),
                    (None, None) => {
                        return Err(OrchestratorError::InvalidUpdateRequest(
                            "Provide --file or --content".to_string(),
                        ))
                    }
                };
                let result = knowledge.insert_document(domain, &text).await;
                self.render(&result, |r| r.message.clone())
            }
            KnowledgeCommands::Query { domain, query, mode, top_k } => {
                let params = query_params(mode, *top_k)?;
                let answer = knowledge.query_domain(domain, query, params).await?;
                self.render(&json!({ "domain": domain, "result": answer }), |_| answer.clone())
            }
            KnowledgeCommands::CrossQuery { query, domains, mode, top_k } => {
                let params = query_params(mode, *top_k)?;
                let domains: Vec<String> = if domains.is_empty() {
                    DocumentKind::ALL.iter().map(|k| k.long_name().to_string()).collect()
                } else {
                    domains.clone()
                };
                let results = knowledge.cross_domain_query(&domains, query, params).await;
                self.render(&results, |results| {
                    results
                        .iter()
                        .map(|(domain, text)| format!("== {} ==\n{}", domain, text))
                        .collect::<Vec<_>>()
                        .join("\n\n")
                })
            }
            KnowledgeCommands::List => {
                let loaded = knowledge.list_domains();
                let mut domains: Vec<String> =
                    DocumentKind::ALL.iter().map(|k| k.long_name().to_string()).collect();
                for domain in &loaded {
                    if !domains.contains(domain) {
                        domains.push(domain.clone());
                    }
                }
                let rows: Vec<Value> = domains
                    .iter()
                    .map(|d| {
                        let path = knowledge.storage_path(d);
                        json!({
                            "domain": d,
                            "path": path.display().to_string(),
                            "exists": path.exists(),
                        })
                    })
                    .collect();
                self.render(&rows, |rows| {
                    let mut table = table(vec!["Domain", "Path", "On Disk"]);
                    for row in rows {
                        table.add_row(vec![
                            row["domain"].as_str().unwrap_or_default().to_string(),
                            row["path"].as_str().unwrap_or_default().to_string(),
                            if row["exists"].as_bool().unwrap_or(false) { "yes" } else { "no" }.to_string(),
                        ]);
                    }
                    table.to_string()
                })
            }
        }
    }

    fn execute_monitor(&self, command: &MonitorCommands) -> Result<String, OrchestratorError> {
        let monitor = &self.services.monitor;
        match command {
            MonitorCommands::Check { agent_type } => {
                let checks: Vec<_> = match agent_type {
                    Some(t) => vec![monitor.run_health_check(t)],
                    None => monitor.run_all_health_checks().into_values().collect(),
                };
                self.render(&checks, |checks| {
                    let mut table = table(vec!["Agent Type", "Status", "Response (s)", "Error"]);
                    for c in checks {
                        table.add_row(vec![
                            c.agent_type.clone(),
                            c.status.as_str().to_string(),
                            format!("{:.3}", c.response_time),
                            c.error_message.clone().unwrap_or_else(|| "-".to_string()),
                        ]);
                    }
                    table.to_string()
                })
            }
            MonitorCommands::Summary => {
                monitor.run_all_health_checks();
                let summary = monitor.get_monitoring_summary();
                self.render(&summary, |s| {
                    let mut table = table(vec!["Agent Type", "Health", "Success Rate", "Avg Response (s)", "Requests"]);
                    for (agent_type, status) in &s.health_status {
                        let perf = s.performance_summary.get(agent_type);
                        table.add_row(vec![
                            agent_type.clone(),
                            status.as_str().to_string(),
                            perf.map_or("-".to_string(), |p| format!("{:.2}", p.success_rate)),
                            perf.map_or("-".to_string(), |p| format!("{:.3}", p.avg_response_time)),
                            perf.map_or("-".to_string(), |p| p.total_requests.to_string()),
                        ]);
                    }
                    format!("{}\n\nAgents: {}  Recent alerts: {}", table, s.total_agents, s.recent_alerts)
                })
            }
        }
    }

    fn save_primary(&self, response: &GlobalAgentResponse) -> Result<(), OrchestratorError> {
        let Some(primary) = response.primary_result.as_ref().filter(|r| r.success) else {
            return Ok(());
        };
        let dir = self.services.config.output_path(&primary.agent_type);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.json", response.session_id));
        std::fs::write(&path, serde_json::to_string_pretty(&primary.output)?)?;
        tracing::info!(path = %path.display(), "Saved generated document");
        Ok(())
    }

    fn render<T: Serialize>(
        &self,
        value: &T,
        text: impl FnOnce(&T) -> String,
    ) -> Result<String, OrchestratorError> {
        match self.format {
            OutputFormat::Json => to_json(value),
            OutputFormat::Text => Ok(text(value)),
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, OrchestratorError> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(header);
    table
}

fn query_params(mode: &str, top_k: usize) -> Result<QueryParams, OrchestratorError> {
    let mode: QueryMode = mode
        .parse()
        .map_err(|e: String| OrchestratorError::ConfigError(e))?;
    Ok(QueryParams::new(mode, top_k))
}

fn format_route(decision: &RoutingDecision) -> String {
    let mut output = format!(
        "Primary: {}\nConfidence: {:.2}\n{}\n",
        decision.primary_agent.long_name(),
        decision.confidence_score,
        decision.reasoning
    );
    let mut scores = table(vec!["Agent", "Score", "Role"]);
    for (kind, score) in &decision.agent_scores {
        let role = if *kind == decision.primary_agent {
            "primary"
        } else if decision.secondary_agents.contains(kind) {
            "secondary"
        } else {
            "-"
        };
        scores.add_row(vec![kind.long_name().to_string(), format!("{:.3}", score), role.to_string()]);
    }
    output.push_str(&format!("\n{}\n", scores));

    if !decision.extracted_data.is_empty() {
        let mut fields = table(vec!["Field", "Value"]);
        for (key, value) in &decision.extracted_data {
            let shown = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            fields.add_row(vec![key.clone(), shown]);
        }
        output.push_str(&format!("\n{}\n", fields));
    }
    output
}

fn format_generate(response: &GlobalAgentResponse) -> String {
    let mut output = format!(
        "{}\nSession: {}\nState: {}\nConfidence: {:.2}\n",
        response.message, response.session_id, response.conversation_state, response.confidence_score
    );
    if let Some(aggregated) = &response.aggregated_content {
        let mut results = table(vec!["Agent", "Success", "Time (s)", "Error"]);
        for (agent_type, run) in &aggregated.all_results {
            results.add_row(vec![
                agent_type.clone(),
                run.success.to_string(),
                format!("{:.3}", run.processing_time),
                run.error.clone().unwrap_or_else(|| "-".to_string()),
            ]);
        }
        output.push_str(&format!("\n{}\n", results));
    }
    if let Some(document) = response.primary_result.as_ref().and_then(|r| r.output.as_ref()) {
        let pretty = serde_json::to_string_pretty(document).unwrap_or_else(|_| document.to_string());
        output.push_str(&format!("\n{}\n", pretty));
    }
    if !response.next_actions.is_empty() {
        output.push_str("\nNext actions:\n");
        for action in &response.next_actions {
            output.push_str(&format!("  - {}\n", action));
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variable() {
        assert_eq!(
            parse_variable("Issuer Name=Acme Bank").unwrap(),
            ("Issuer Name".to_string(), "Acme Bank".to_string())
        );
        assert!(parse_variable("no-equals").is_err());
        assert!(parse_variable("=value").is_err());
    }

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "findoc", "agents", "list", "--format", "json", "--log-level", "debug",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(
            cli.command,
            Commands::Agents { command: AgentCommands::List }
        ));
    }

    #[test]
    fn test_generate_splits_agent_list() {
        let cli = Cli::try_parse_from([
            "findoc", "generate", "Make an ISM", "--agents", "ism,prs", "--var", "Tenor=5 years",
        ])
        .unwrap();
        match cli.command {
            Commands::Generate { agents, variables, .. } => {
                assert_eq!(agents, vec!["ism", "prs"]);
                assert_eq!(variables[0].0, "Tenor");
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn test_query_params_rejects_unknown_mode() {
        assert!(query_params("sideways", 5).is_err());
        assert_eq!(query_params("naive", 3).unwrap().top_k, 3);
    }

    #[tokio::test]
    async fn test_agents_list_json() {
        let dir = tempfile::tempdir().unwrap();
        let config = FindocConfig::default().rooted_at(dir.path());
        let context = CliContext::new(config, OutputFormat::Json).unwrap();
        let output = context
            .execute(&Commands::Agents { command: AgentCommands::List })
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 4);
    }
}
