//! Human-readable summary of a resolved run.

use colored::Colorize;
use dpgan_config::{Resolution, RunConfig};

pub fn print(resolution: &Resolution) {
    let config = &resolution.config;
    let heading = if resolution.resumed { "Resumed run" } else { "Resolved run" };
    println!("{}", heading.bold().cyan());

    for (label, value) in rows(config) {
        println!("  {:<18} {}", format!("{label}:").dimmed(), value);
    }

    for notice in &resolution.notices {
        let text = notice.to_string();
        if notice.is_warning() {
            println!("  {} {}", "warning:".yellow().bold(), text);
        } else {
            println!("  {} {}", "note:".blue(), text);
        }
    }
}

fn rows(config: &RunConfig) -> Vec<(&'static str, String)> {
    let conditioning = if config.model.conditional {
        format!("{} ({} classes)", config.model.conditional_arch, config.model.n_classes)
    } else {
        "none".to_string()
    };
    let privacy = config
        .privacy
        .dp_mode
        .map_or_else(|| "disabled".to_string(), |mode| format!("{mode} (sigma {})", config.privacy.sigma));

    vec![
        ("dataset", config.run.dataset.to_string()),
        ("model", config.model.model.to_string()),
        ("output_dir", config.layout().display_root()),
        ("seed", config.run.manual_seed.to_string()),
        ("epochs", config.optim.n_epochs.to_string()),
        ("batch_size", config.optim.batch_size.to_string()),
        ("conditional", conditioning),
        ("dp_mode", privacy),
        ("log_every", config.schedule.log_every.to_string()),
        ("sample_every", config.schedule.sample_every.to_string()),
    ]
}
