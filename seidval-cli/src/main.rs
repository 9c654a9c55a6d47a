//! The seidval utility validates SEID2 enterprise certificates from the command line.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod args;

use std::fs;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{error, info, LevelFilter};
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use serde::Serialize;

use seidval::{
    download_crls, CertificateValidator, CertificateValidatorBuilder, DirectorySnapshots,
    Environment, HttpCrlFetcher, TimeOfInterest, TrustProperties, UnknownRevocationStatus,
};

use crate::args::SeidvalArgs;

/// Outcome for one certificate file, as emitted by --json
#[derive(Serialize)]
struct Outcome {
    file: String,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

fn configure_logging(args: &SeidvalArgs) {
    let mut logging_configured = false;

    if let Some(logging_config) = &args.logging_config {
        if let Err(e) = log4rs::init_file(logging_config, Default::default()) {
            println!(
                "ERROR: failed to configure logging using {} with {:?}. Continuing without logging.",
                logging_config, e
            );
        } else {
            logging_configured = true;
        }
    }

    if !logging_configured {
        // if there's no config, prepare one using stderr so results on stdout stay clean
        let stderr = ConsoleAppender::builder()
            .target(log4rs::append::console::Target::Stderr)
            .encoder(Box::new(PatternEncoder::new("{m}{n}")))
            .build();
        match Config::builder()
            .appender(Appender::builder().build("stderr", Box::new(stderr)))
            .build(Root::builder().appender("stderr").build(LevelFilter::Info))
        {
            Ok(config) => {
                if let Err(e) = log4rs::init_config(config) {
                    println!(
                        "ERROR: failed to configure logging for stderr with {:?}. Continuing without logging.",
                        e
                    );
                }
            }
            Err(e) => {
                println!(
                    "ERROR: failed to prepare default logging configuration with {:?}. Continuing without logging",
                    e
                );
            }
        }
    }
}

fn build_validator(args: &SeidvalArgs, environment: Environment) -> seidval::Result<CertificateValidator> {
    let mut builder = CertificateValidatorBuilder::new(environment).with_defaults();
    if let Some(properties) = &args.properties {
        let overrides = TrustProperties::from_json_file(Path::new(properties))?;
        builder = builder.with_properties(&overrides);
    }
    if let Some(folder) = &args.crl_folder {
        builder = builder.with_crl_cache_on_disk(folder);
    } else if args.in_memory {
        builder = builder.with_crl_cache_in_memory();
    }
    if let Some(folder) = &args.snapshots {
        builder = builder.with_snapshots(Arc::new(DirectorySnapshots::new(folder)));
    }
    if args.accept_unknown {
        builder = builder.with_unknown_revocation_status(UnknownRevocationStatus::Accept);
    }
    builder.build()
}

fn validate_file(validator: &CertificateValidator, file: &str, toi: TimeOfInterest) -> Outcome {
    let result = match fs::read(file) {
        Ok(bytes) => validator.validate_at(bytes.as_slice(), toi),
        Err(e) => Err(e.into()),
    };
    match result {
        Ok(()) => Outcome {
            file: file.to_string(),
            valid: true,
            reason: None,
        },
        Err(e) => {
            error!("{file} failed validation: {e}");
            Outcome {
                file: file.to_string(),
                valid: false,
                reason: Some(e.to_string()),
            }
        }
    }
}

fn run(args: &SeidvalArgs) -> seidval::Result<bool> {
    let environment = Environment::of(&args.environment)?;

    if let Some(folder) = &args.download_crls {
        let properties = seidval::default_properties(environment);
        let overrides = match &args.properties {
            Some(p) => TrustProperties::from_json_file(Path::new(p))?,
            None => TrustProperties::default(),
        };
        let properties = seidval::merge(&properties, &overrides);
        let written = download_crls(
            &HttpCrlFetcher::default(),
            environment,
            &properties.crl_distribution_points,
            Path::new(folder),
        )?;
        info!("Downloaded {} CRLs to {folder}", written.len());
        return Ok(true);
    }

    let toi = match &args.time_of_interest {
        Some(t) => TimeOfInterest::parse(t)?,
        None => TimeOfInterest::now()?,
    };
    let validator = build_validator(args, environment)?;
    let outcomes: Vec<Outcome> = args
        .certificates
        .iter()
        .map(|file| validate_file(&validator, file, toi))
        .collect();
    validator.crl_cache().stop();

    if args.json {
        match serde_json::to_string_pretty(&outcomes) {
            Ok(json) => println!("{json}"),
            Err(e) => return Err(e.into()),
        }
    } else {
        for outcome in &outcomes {
            match &outcome.reason {
                None => println!("{}: valid", outcome.file),
                Some(reason) => println!("{}: invalid ({reason})", outcome.file),
            }
        }
    }
    Ok(outcomes.iter().all(|o| o.valid))
}

fn main() -> ExitCode {
    let args = SeidvalArgs::parse();
    configure_logging(&args);

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            println!("ERROR: {e}");
            ExitCode::from(2)
        }
    }
}
