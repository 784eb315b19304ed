//! Terminal rendering of pipeline results

use console::Style;
use router_core::config::{prompts::REQUIRED_KEYS, RouterConfig};
use router_core::{PipelineOutcome, RouteOutcome, Source};

pub struct OutputFormatter {
    blue: Style,
    green: Style,
    yellow: Style,
    bold: Style,
    dim: Style,
}

impl Default for OutputFormatter {
    fn default() -> Self {
        Self {
            blue: Style::new().blue(),
            green: Style::new().green(),
            yellow: Style::new().yellow(),
            bold: Style::new().bold(),
            dim: Style::new().dim(),
        }
    }
}

impl OutputFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn print_outcome(&self, outcome: &PipelineOutcome) {
        println!(
            "{} {}",
            self.bold.apply_to("Final Intent:"),
            self.green.apply_to(outcome.final_intent)
        );
        if let Some((label, data)) = outcome.agent_data() {
            println!("{} {}", self.bold.apply_to(format!("{}:", label)), data);
        }
        println!("{} {}", self.bold.apply_to("LLM Output:"), outcome.llm_output);
    }

    pub fn print_route(&self, route: &RouteOutcome) {
        println!(
            "{} {} ({})",
            self.bold.apply_to("Source:"),
            self.blue.apply_to(route.classification.source),
            self.dim.apply_to(format!("confidence {:.2}", route.classification.confidence))
        );
        println!(
            "{} {} / {}",
            self.bold.apply_to("Final:"),
            self.green.apply_to(route.decision.final_source),
            self.green.apply_to(route.decision.final_intent)
        );
    }

    pub fn print_config_summary(&self, config: &RouterConfig) {
        println!("{} {}", self.bold.apply_to("Config dir:"), config.dir.display());
        println!(
            "{} {} @ {}",
            self.bold.apply_to("Model:"),
            config.settings.llm.model,
            config.settings.llm.base_url
        );

        println!("{}", self.bold.apply_to("Prompts:"));
        for key in config.prompts.keys() {
            let marker = if REQUIRED_KEYS.contains(&key) { "required" } else { "extra" };
            println!("  {} {}", key, self.dim.apply_to(format!("({})", marker)));
        }

        println!("{}", self.bold.apply_to("Rules:"));
        for source in Source::ALL {
            let rules = config.rules.rules_for(source);
            if rules.is_empty() {
                println!(
                    "  {} {}",
                    self.blue.apply_to(source),
                    self.yellow.apply_to(format!("(default {} only)", source.default_intent()))
                );
                continue;
            }
            println!("  {}", self.blue.apply_to(source));
            for (i, rule) in rules.iter().enumerate() {
                println!("    {}. {} <- {}", i + 1, rule.intent, rule.keywords.join(", "));
            }
        }

        if std::env::var(&config.settings.search.api_key_env).is_err() {
            println!(
                "{}",
                self.yellow.apply_to(format!(
                    "warning: {} is not set; web lookups will report failures",
                    config.settings.search.api_key_env
                ))
            );
        }
        println!("{}", self.green.apply_to("Configuration OK"));
    }
}
