//! PCRD 资源版本更新器 CLI
//!
//! 非交互式 CLI：单次解析、定时监视、健康检查，以及设置和历史的管理
//! 配置来自命令行参数或环境变量（支持 `.env`）

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pcrd_version_updater::pcrd::db::create_sqlite_pool_with_migration;
use pcrd_version_updater::pcrd::event::VersionListener;
use pcrd_version_updater::pcrd::store::{HistoryDao, SettingDao};
use pcrd_version_updater::{
    Credential, OpContext, PcrdSetting, ProbeConfig, ResolveOutcome, ResourceVersionUpdater,
    ServerCode, Setting, UpdaterConfig, UpdaterError,
};
use std::sync::Arc;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// PCRD 资源版本更新器
#[derive(Parser, Debug)]
#[command(name = "pcrd-version-updater")]
#[command(about = "PCRD 资源版本更新器 - 发现并记录游戏资源版本", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    /// 日志级别（RUST_LOG 优先）
    #[arg(long, env = "LOG_LEVEL", default_value = "info,pcrd_version_updater=debug")]
    log_level: String,

    /// 输出 JSON 格式日志
    #[arg(long, env = "LOG_JSON", default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// 默认目标设置 ID
    #[arg(long, env = "TARGET_APPID")]
    target_appid: Option<String>,

    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://pcrd-version.db?mode=rwc")]
    database_url: String,

    /// 应用信息服务地址
    #[arg(long, env = "SERVICE_APPLICATION_BASEURL", default_value = "")]
    application_base_url: String,

    #[arg(
        long,
        env = "PCRD_JP_ENDPOINT",
        default_value = "http://prd-priconne-redive.akamaized.net"
    )]
    jp_endpoint: String,

    #[arg(long, env = "PCRD_JP_LOCALE", default_value = "Jpn")]
    jp_locale: String,

    #[arg(long, env = "PCRD_TH_ENDPOINT", default_value = "https://pcc-game.i3play.com")]
    th_endpoint: String,

    #[arg(long, env = "PCRD_TH_SALT", default_value = "")]
    th_salt: String,

    /// 单次 HTTP 请求超时（秒）
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 10)]
    http_timeout_secs: u64,

    #[arg(long, env = "PROBE_STRIDE", default_value_t = 10)]
    probe_stride: i64,

    #[arg(long, env = "PROBE_ATTEMPTS", default_value_t = 19)]
    probe_attempts: u32,

    #[arg(long, env = "PROBE_DELAY_MS", default_value_t = 1000)]
    probe_delay_ms: u64,

    /// 版本事件 Webhook，不设置时事件只写日志
    #[arg(long, env = "VERSION_EVENT_WEBHOOK")]
    event_webhook: Option<String>,
}

impl ConfigArgs {
    fn to_config(&self) -> UpdaterConfig {
        UpdaterConfig {
            database_url: self.database_url.clone(),
            application_base_url: self.application_base_url.clone(),
            jp_endpoint: self.jp_endpoint.clone(),
            jp_locale: self.jp_locale.clone(),
            th_endpoint: self.th_endpoint.clone(),
            th_salt: self.th_salt.clone(),
            http_timeout: Duration::from_secs(self.http_timeout_secs),
            probe: ProbeConfig {
                stride: self.probe_stride,
                attempts: self.probe_attempts,
                delay: Duration::from_millis(self.probe_delay_ms),
            },
            event_webhook: self.event_webhook.clone().filter(|url| !url.is_empty()),
        }
    }

    fn target(&self, id: Option<String>) -> Result<String> {
        id.or_else(|| self.target_appid.clone())
            .filter(|id| !id.is_empty())
            .ok_or(UpdaterError::MissingAppId)
            .context("未指定设置 ID（参数或 TARGET_APPID）")
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 解析一次资源版本
    Resolve {
        /// 设置 ID（默认 TARGET_APPID）
        id: Option<String>,
    },
    /// 定时解析，Ctrl+C 退出
    Watch {
        id: Option<String>,

        #[arg(long, default_value_t = 300)]
        interval_secs: u64,
    },
    /// 检查数据库和各后端是否可用
    Health,
    /// 设置管理
    #[command(subcommand)]
    Setting(SettingCommand),
    /// 查看版本历史（最新在前）
    History {
        id: String,

        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[derive(Subcommand, Debug)]
enum SettingCommand {
    /// 新增或更新设置
    Put {
        #[arg(long)]
        id: String,

        /// th | jp
        #[arg(long)]
        server_code: ServerCode,

        #[arg(long, default_value = "")]
        udid: String,

        #[arg(long, default_value_t = 0)]
        short_udid: i32,

        #[arg(long, default_value_t = 0)]
        viewer_id: i32,

        #[arg(long, default_value = "")]
        session_id: String,

        /// 日服首次探测的起始版本
        #[arg(long, default_value = "")]
        guess_start_version: String,
    },
}

/// 初始化日志
fn init_logger(log_level: &str, json: bool) {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    // 优先使用环境变量 RUST_LOG（如果设置了），否则使用命令行参数
    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter_layer);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_file(true)
                    .with_line_number(true)
                    .with_target(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// 事件监听器（输出到日志）
struct CliVersionListener;

#[async_trait::async_trait]
impl VersionListener for CliVersionListener {
    async fn on_version_changed(&self, key: String, event_json: String) {
        info!("[CLI/Event] 📢 版本变更: {} {}", key, event_json);
    }
}

fn build_updater(config: &UpdaterConfig, db: sqlx::SqlitePool) -> Result<ResourceVersionUpdater> {
    if config.event_webhook.is_some() {
        ResourceVersionUpdater::with_db(config, db)
    } else {
        ResourceVersionUpdater::with_listener_and_db(config, Arc::new(CliVersionListener), db)
    }
}

fn report(outcome: &ResolveOutcome) {
    match outcome {
        ResolveOutcome::Unchanged { version } => {
            info!(
                "[CLI] 💤 资源版本未变化: {} res={}",
                version.setting_id, version.res_version
            );
        }
        ResolveOutcome::Updated { previous, current } => {
            info!(
                "[CLI] ✅ 资源版本已更新: {} {:?} -> {} (app {})",
                current.setting_id, previous.res_version, current.res_version, current.app_version
            );
        }
    }
}

/// Ctrl+C 时取消令牌
fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("[CLI] 收到 Ctrl+C，正在停止...");
            cancel.cancel();
        }
    });
}

async fn watch(updater: &ResourceVersionUpdater, id: &str, interval: Duration) {
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("[CLI] ⏰ 每 {} 秒解析一次: {}", interval.as_secs(), id);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // 每次运行从头开始，使用新的 trace_id
                let ctx = OpContext::with_cancellation(cancel.clone());
                match updater.resolve_and_publish(&ctx, id).await {
                    Ok(outcome) => report(&outcome),
                    Err(e) if e.kind() == &UpdaterError::Cancelled => break,
                    Err(e) => error!("[CLI] ❌ 本次解析失败 (trace_id={}): {}", ctx.trace_id(), e),
                }
            }
            _ = cancel.cancelled() => break,
        }
    }
    info!("[CLI] 👋 程序退出");
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_logger(&cli.log_level, cli.log_json);

    let config = cli.config.to_config();
    let db = create_sqlite_pool_with_migration(&config.database_url).await?;

    match cli.command {
        Command::Resolve { id } => {
            let id = cli.config.target(id)?;
            let updater = build_updater(&config, db)?;

            let cancel = CancellationToken::new();
            cancel_on_ctrl_c(cancel.clone());
            let ctx = OpContext::with_cancellation(cancel);

            let outcome = updater.resolve_and_publish(&ctx, &id).await?;
            report(&outcome);
        }
        Command::Watch { id, interval_secs } => {
            let id = cli.config.target(id)?;
            let updater = build_updater(&config, db)?;
            watch(&updater, &id, Duration::from_secs(interval_secs.max(1))).await;
        }
        Command::Health => {
            let updater = build_updater(&config, db)?;
            updater
                .health_check(&OpContext::new())
                .await
                .context("健康检查失败")?;
            println!("ok");
        }
        Command::Setting(SettingCommand::Put {
            id,
            server_code,
            udid,
            short_udid,
            viewer_id,
            session_id,
            guess_start_version,
        }) => {
            let setting = PcrdSetting {
                setting: Setting { id, server_code },
                credential: Credential {
                    udid,
                    short_udid,
                    viewer_id,
                    session_id,
                },
                guess_start_version,
            };
            SettingDao::new(db).save_setting(&setting).await?;
            println!("saved {} ({})", setting.setting.id, setting.setting.server_code);
        }
        Command::History { id, limit } => {
            let histories = HistoryDao::new(db).list_by_setting(&id, limit).await?;
            if histories.is_empty() {
                println!("no history for {}", id);
            }
            for h in histories {
                println!(
                    "{}\t{}\tapp={}\tres={}",
                    h.updated_at.to_rfc3339(),
                    h.server_code,
                    h.app_version,
                    h.res_version
                );
            }
        }
    }

    Ok(())
}
