use std::path::Path;

use policy_crawler_core::runner::fetch;
use policy_crawler_core::{AwsCli, CallerIdentity, CliInvocation};
use serde::Serialize;

use super::common::load_config;
use crate::cli::args::{DoctorArgs, OutputFormat};
use crate::exit_codes::{CRAWL_FAILED, SUCCESS};

#[derive(Debug, Serialize)]
struct DoctorReport {
    generated_at: String,
    aws_bin: String,
    aws_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aws_error: Option<String>,
    profiles: Vec<ProfileCheck>,
}

#[derive(Debug, Serialize)]
struct ProfileCheck {
    profile: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    identity: Option<CallerIdentity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl DoctorReport {
    fn healthy(&self) -> bool {
        self.aws_version.is_some() && self.profiles.iter().all(|p| p.ok)
    }
}

pub async fn run(args: DoctorArgs, config_path: Option<&Path>) -> anyhow::Result<i32> {
    let config = load_config(config_path, |c| {
        if !args.profiles.is_empty() {
            c.profiles = args.profiles.clone();
        }
        if let Some(bin) = &args.aws_bin {
            c.aws_bin = bin.clone();
        }
        if let Some(secs) = args.timeout_secs {
            c.command_timeout_secs = secs;
        }
    })?;
    config.validate_runner()?;

    let cli = AwsCli::from_config(&config);
    let (aws_version, aws_error) = match cli.version().await {
        Ok(v) => (Some(v), None),
        Err(e) => (None, Some(e.to_string())),
    };

    let mut profiles = Vec::with_capacity(config.profiles.len());
    if aws_version.is_some() {
        for profile in &config.profiles {
            let invocation = CliInvocation::new("sts", "get-caller-identity", profile.as_str());
            let check = match fetch::<CallerIdentity>(&cli, &invocation).await {
                Ok(identity) => ProfileCheck {
                    profile: profile.clone(),
                    ok: true,
                    identity: Some(identity),
                    error: None,
                },
                Err(e) => ProfileCheck {
                    profile: profile.clone(),
                    ok: false,
                    identity: None,
                    error: Some(e.to_string()),
                },
            };
            profiles.push(check);
        }
    }

    let report = DoctorReport {
        generated_at: chrono::Utc::now().to_rfc3339(),
        aws_bin: config.aws_bin.clone(),
        aws_version,
        aws_error,
        profiles,
    };

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => println!("{}", format_text(&report)),
    }

    Ok(if report.healthy() {
        SUCCESS
    } else {
        CRAWL_FAILED
    })
}

fn format_text(report: &DoctorReport) -> String {
    let mut out = String::new();
    match (&report.aws_version, &report.aws_error) {
        (Some(version), _) => out.push_str(&format!("AWS CLI: {} ({})\n", version, report.aws_bin)),
        (None, error) => out.push_str(&format!(
            "AWS CLI: FAILED ({}): {}\n",
            report.aws_bin,
            error.as_deref().unwrap_or("unknown error")
        )),
    }

    if report.profiles.is_empty() && report.aws_version.is_some() {
        out.push_str("No profiles configured.\n");
    }
    for check in &report.profiles {
        match (&check.identity, &check.error) {
            (Some(identity), _) => out.push_str(&format!(
                "Profile \"{}\": ok (account {}, {})\n",
                check.profile,
                identity.account.as_deref().unwrap_or("?"),
                identity.arn.as_deref().unwrap_or("?")
            )),
            (None, error) => out.push_str(&format!(
                "Profile \"{}\": FAILED: {}\n",
                check.profile,
                error.as_deref().unwrap_or("unknown error")
            )),
        }
    }
    out.trim_end().to_string()
}
