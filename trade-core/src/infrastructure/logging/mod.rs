//! Logging infrastructure using `log` + `log4rs`.

mod consts;

pub use consts::*;

use crate::foundation::TradeError;
use log::LevelFilter;
use log4rs::{
    append::{
        console::{ConsoleAppender, Target},
        rolling_file::{
            policy::compound::{roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger, CompoundPolicy},
            RollingFileAppender,
        },
    },
    config::{Appender, Logger, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
    Config,
};
use std::io::IsTerminal;
use std::path::Path;

const CONSOLE_APPENDER: &str = "stderr";
const LOG_FILE_APPENDER: &str = "log_file";
const ERR_LOG_FILE_APPENDER: &str = "err_log_file";

/// One entry of a comma-separated filter expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogFilter {
    App(LevelFilter),
    Root(LevelFilter),
    Module(String, LevelFilter),
}

pub fn parse_log_filter(entry: &str) -> Option<LogFilter> {
    let entry = entry.trim();
    match entry.split_once('=') {
        None => entry.parse().ok().map(LogFilter::App),
        Some((module, level)) => {
            let module = module.trim();
            let level = level.trim().parse().ok()?;
            match module {
                "" => None,
                "root" => Some(LogFilter::Root(level)),
                _ => Some(LogFilter::Module(module.to_string(), level)),
            }
        }
    }
}

fn parse_filters(filters: &str) -> impl Iterator<Item = LogFilter> + '_ {
    filters.split(',').filter(|part| !part.trim().is_empty()).filter_map(parse_log_filter)
}

fn parse_app_level(filters: &str) -> LevelFilter {
    parse_filters(filters)
        .find_map(|filter| match filter {
            LogFilter::App(level) => Some(level),
            _ => None,
        })
        .unwrap_or(LevelFilter::Info)
}

fn parse_root_override(filters: &str) -> Option<LevelFilter> {
    parse_filters(filters).find_map(|filter| match filter {
        LogFilter::Root(level) => Some(level),
        _ => None,
    })
}

fn parse_module_levels(filters: &str) -> Vec<(String, LevelFilter)> {
    parse_filters(filters)
        .filter_map(|filter| match filter {
            LogFilter::Module(module, level) => Some((module, level)),
            _ => None,
        })
        .collect()
}

fn rolling_appender(dir: &Path, file_name: &str) -> Result<RollingFileAppender, TradeError> {
    let log_path = dir.join(file_name);
    let archive_pattern = dir.join(format!("{file_name}.{{}}.gz"));
    let archive_pattern = archive_pattern
        .to_str()
        .ok_or_else(|| TradeError::ConfigError(format!("log dir is not valid utf-8: {}", dir.display())))?;
    let roller = FixedWindowRoller::builder()
        .base(1)
        .build(archive_pattern, LOG_FILE_MAX_ROLLS)
        .map_err(|err| TradeError::ConfigError(format!("log roller: {err}")))?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(LOG_FILE_MAX_SIZE)), Box::new(roller));
    RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_LINE_PATTERN)))
        .build(log_path, Box::new(policy))
        .map_err(|err| TradeError::ConfigError(format!("log file appender: {err}")))
}

/// Initialize the logger with optional file output.
///
/// `filters` is a comma-separated expression: `"info"` sets the level for
/// whitelisted crates, `"<crate>=<level>"` opts a crate in, `"root=<level>"`
/// opts in every crate. The logger is global; repeated calls are ignored.
pub fn init_logger(log_dir: Option<&str>, filters: &str) -> Result<(), TradeError> {
    let app_level = parse_app_level(filters);
    let root_level = parse_root_override(filters).unwrap_or(LevelFilter::Off);
    let module_levels = parse_module_levels(filters);

    let console_pattern = if std::io::stderr().is_terminal() { LOG_LINE_PATTERN_COLORED } else { LOG_LINE_PATTERN };
    let console = ConsoleAppender::builder().target(Target::Stderr).encoder(Box::new(PatternEncoder::new(console_pattern))).build();

    let mut config_builder = Config::builder().appender(Appender::builder().build(CONSOLE_APPENDER, Box::new(console)));
    let mut root_appenders: Vec<&str> = vec![CONSOLE_APPENDER];

    if let Some(dir) = log_dir.map(str::trim).filter(|dir| !dir.is_empty()) {
        let dir = Path::new(dir);
        let file_appender = rolling_appender(dir, LOG_FILE_NAME)?;
        config_builder = config_builder.appender(Appender::builder().build(LOG_FILE_APPENDER, Box::new(file_appender)));
        root_appenders.push(LOG_FILE_APPENDER);

        let err_file_appender = rolling_appender(dir, ERR_LOG_FILE_NAME)?;
        config_builder = config_builder.appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(LevelFilter::Warn)))
                .build(ERR_LOG_FILE_APPENDER, Box::new(err_file_appender)),
        );
        root_appenders.push(ERR_LOG_FILE_APPENDER);
    }

    let appender_names: Vec<String> = root_appenders.iter().map(|name| (*name).to_string()).collect();

    for crate_name in WHITELISTED_CRATES {
        if !module_levels.iter().any(|(module, _)| module.as_str() == *crate_name) {
            config_builder = config_builder
                .logger(Logger::builder().appenders(appender_names.clone()).additive(false).build(*crate_name, app_level));
        }
    }

    for (module, level) in &module_levels {
        config_builder =
            config_builder.logger(Logger::builder().appenders(appender_names.clone()).additive(false).build(module, *level));
    }

    let config = config_builder
        .build(Root::builder().appenders(root_appenders).build(root_level))
        .map_err(|err| TradeError::ConfigError(format!("logger config: {err}")))?;
    let _ = log4rs::init_config(config);
    Ok(())
}
