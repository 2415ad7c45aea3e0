//! 资源版本更新服务层
//!
//! 一次运行：读取设置 -> 读取应用信息 -> 读取（或创建）当前版本 -> 按区域发现资源版本
//! -> 与存储值比较，变化时依次更新版本、写入历史、发布事件。
//! 任一阶段失败都会以 [`ResolveError`] 返回并标明阶段；发布失败不会回滚已写入的数据。

use crate::pcrd::application::ApplicationApi;
use crate::pcrd::config::UpdaterConfig;
use crate::pcrd::context::OpContext;
use crate::pcrd::error::{ResolveError, ResolveStage, UpdaterError, UpdaterResult};
use crate::pcrd::event::{
    EmptyVersionListener, ListenerVersionEvent, VersionListener, WebhookVersionEvent,
};
use crate::pcrd::jp::{PcrdJpApi, VersionProbe};
use crate::pcrd::models::{now_millis, GameVersion, PcrdVersion, ServerCode};
use crate::pcrd::repository::{
    ApplicationRepository, HistoryRepository, PcrdJpRepository, PcrdThRepository,
    SettingRepository, VersionEventRepository, VersionRepository,
};
use crate::pcrd::store::{HistoryDao, SettingDao, VersionDao};
use crate::pcrd::th::PcrdThApi;
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use tracing::{debug, error, info, Instrument};

/// 一次运行的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// 资源版本没有变化，未写入任何数据
    Unchanged { version: GameVersion },
    /// 资源版本已更新，`current` 为写入后的版本行
    Updated {
        previous: GameVersion,
        current: GameVersion,
    },
}

impl ResolveOutcome {
    pub fn version(&self) -> &GameVersion {
        match self {
            ResolveOutcome::Unchanged { version } => version,
            ResolveOutcome::Updated { current, .. } => current,
        }
    }

    pub fn is_updated(&self) -> bool {
        matches!(self, ResolveOutcome::Updated { .. })
    }
}

fn at(stage: ResolveStage) -> impl FnOnce(UpdaterError) -> ResolveError {
    move |source| {
        error!("[Updater] ❌ {} 失败: {}", stage, source);
        ResolveError::new(stage, source)
    }
}

/// 资源版本更新器（编排器）
pub struct ResourceVersionUpdater {
    application: Arc<dyn ApplicationRepository>,
    settings: Arc<dyn SettingRepository>,
    versions: Arc<dyn VersionRepository>,
    histories: Arc<dyn HistoryRepository>,
    th: Arc<dyn PcrdThRepository>,
    jp: Arc<dyn PcrdJpRepository>,
    events: Arc<dyn VersionEventRepository>,
}

impl ResourceVersionUpdater {
    /// 使用外部构造好的协作方创建更新器
    pub fn new(
        application: Arc<dyn ApplicationRepository>,
        settings: Arc<dyn SettingRepository>,
        versions: Arc<dyn VersionRepository>,
        histories: Arc<dyn HistoryRepository>,
        th: Arc<dyn PcrdThRepository>,
        jp: Arc<dyn PcrdJpRepository>,
        events: Arc<dyn VersionEventRepository>,
    ) -> Self {
        Self {
            application,
            settings,
            versions,
            histories,
            th,
            jp,
            events,
        }
    }

    /// 按配置组装 REST 适配器和 SQLite 存储（使用共享连接池）
    ///
    /// 配置了 Webhook 时事件发往 Webhook，否则交给默认监听器写日志。
    pub fn with_db(config: &UpdaterConfig, db: Pool<Sqlite>) -> anyhow::Result<Self> {
        let client = config.http_client()?;
        let events: Arc<dyn VersionEventRepository> = match &config.event_webhook {
            Some(url) => {
                info!("[Updater] 版本事件发布到 Webhook: {}", url);
                Arc::new(WebhookVersionEvent::new(client.clone(), url.clone()))
            }
            None => Arc::new(ListenerVersionEvent::new(Arc::new(EmptyVersionListener))),
        };
        Ok(Self::with_events(config, client, db, events))
    }

    /// 同 [`Self::with_db`]，但事件总是交给指定的监听器
    pub fn with_listener_and_db(
        config: &UpdaterConfig,
        listener: Arc<dyn VersionListener>,
        db: Pool<Sqlite>,
    ) -> anyhow::Result<Self> {
        let client = config.http_client()?;
        let events = Arc::new(ListenerVersionEvent::new(listener));
        Ok(Self::with_events(config, client, db, events))
    }

    fn with_events(
        config: &UpdaterConfig,
        client: reqwest::Client,
        db: Pool<Sqlite>,
        events: Arc<dyn VersionEventRepository>,
    ) -> Self {
        let jp_api = PcrdJpApi::new(
            client.clone(),
            config.jp_endpoint.clone(),
            config.jp_locale.clone(),
        );

        Self::new(
            Arc::new(ApplicationApi::new(
                client.clone(),
                config.application_base_url.clone(),
            )),
            Arc::new(SettingDao::new(db.clone())),
            Arc::new(VersionDao::new(db.clone())),
            Arc::new(HistoryDao::new(db)),
            Arc::new(PcrdThApi::new(
                client,
                config.th_endpoint.clone(),
                config.th_salt.clone(),
            )),
            Arc::new(VersionProbe::new(jp_api, config.probe.clone())),
            events,
        )
    }

    /// 检查所有协作方是否可用，返回第一个失败
    pub async fn health_check(&self, ctx: &OpContext) -> UpdaterResult<()> {
        let span = tracing::info_span!(
            parent: ctx.span(),
            "updater.health_check",
            trace_id = %ctx.trace_id()
        );

        async {
            self.application.health_check(ctx).await?;
            self.settings.health_check(ctx).await?;
            self.versions.health_check(ctx).await?;
            self.histories.health_check(ctx).await?;
            self.th.health_check(ctx).await?;
            self.jp.health_check(ctx).await?;
            info!("[Updater] ✅ 健康检查通过");
            Ok::<(), UpdaterError>(())
        }
        .instrument(span)
        .await
    }

    /// 解析指定设置的资源版本，变化时写入并发布
    pub async fn resolve_and_publish(
        &self,
        ctx: &OpContext,
        id: &str,
    ) -> Result<ResolveOutcome, ResolveError> {
        let span = tracing::info_span!(
            parent: ctx.span(),
            "updater.resolve_and_publish",
            trace_id = %ctx.trace_id(),
            id = %id
        );
        self.resolve(ctx, id).instrument(span).await
    }

    async fn resolve(&self, ctx: &OpContext, id: &str) -> Result<ResolveOutcome, ResolveError> {
        info!("[Updater] 🚀 开始解析资源版本: {}", id);

        // 1. 设置
        let setting = self
            .settings
            .get_setting_by_id(ctx, id)
            .await
            .map_err(at(ResolveStage::LoadSetting))?;

        // 2. 应用信息
        let application = self
            .application
            .get_android_app_by_id(ctx, &setting.setting.id)
            .await
            .map_err(at(ResolveStage::LoadApplication))?;
        debug!(
            "[Updater] 应用信息: {} version={}",
            application.bundle_id, application.version
        );

        // 3. 当前版本，不存在时创建空资源版本
        let current = match self.versions.get_by_id(ctx, &setting.setting.id).await {
            Ok(version) => version,
            Err(UpdaterError::VersionNotFound(_)) => {
                let version =
                    GameVersion::initial(&setting.setting, &application.version, now_millis());
                self.versions
                    .create(ctx, &version)
                    .await
                    .map_err(at(ResolveStage::CreateVersion))?;
                info!("[Updater] 首次运行，已创建版本行: {}", version.setting_id);
                version
            }
            Err(e) => return Err(at(ResolveStage::LoadVersion)(e)),
        };

        // 4. 按区域发现资源版本
        let discovered = match setting.setting.server_code {
            ServerCode::Th => {
                let version = PcrdVersion {
                    app_version: application.version.clone(),
                    res_version: String::new(),
                };
                self.th
                    .get_resource_version(ctx, &setting.credential, &version)
                    .await
            }
            ServerCode::Jp => {
                let start = if current.res_version.is_empty() {
                    setting.guess_start_version.as_str()
                } else {
                    current.res_version.as_str()
                };
                self.jp.get_resource_version(ctx, start).await
            }
        }
        .and_then(|v| {
            if v.is_empty() {
                Err(UpdaterError::ResVersionUnavailable)
            } else {
                Ok(v)
            }
        })
        .map_err(at(ResolveStage::Discover))?;

        // 5. 没有变化
        if discovered == current.res_version {
            info!(
                "[Updater] 资源版本未变化，无需更新: {} res={}",
                current.setting_id, current.res_version
            );
            return Ok(ResolveOutcome::Unchanged { version: current });
        }

        // 6. 更新 -> 历史 -> 发布
        // 最后一个取消检查点：之后的写入和发布必须整体完成，否则下一次运行会判定为未变化
        ctx.check().map_err(at(ResolveStage::UpdateVersion))?;
        let next = GameVersion {
            app_version: application.version.clone(),
            res_version: discovered,
            ..current.clone()
        };
        let stored = self
            .versions
            .update(ctx, &next)
            .await
            .map_err(at(ResolveStage::UpdateVersion))?;
        self.histories
            .create(ctx, &stored)
            .await
            .map_err(at(ResolveStage::WriteHistory))?;
        self.events
            .publish_version(ctx, &stored)
            .await
            .map_err(at(ResolveStage::Publish))?;

        info!(
            "[Updater] ✅ 资源版本已更新: {} {:?} -> {}",
            stored.setting_id, current.res_version, stored.res_version
        );
        Ok(ResolveOutcome::Updated {
            previous: current,
            current: stored,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcrd::db::create_sqlite_pool_with_migration;
    use crate::pcrd::models::{AppInfo, Credential, PcrdSetting, Setting};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeApplications {
        versions: HashMap<String, String>,
    }

    #[async_trait]
    impl ApplicationRepository for FakeApplications {
        async fn health_check(&self, _ctx: &OpContext) -> UpdaterResult<()> {
            Ok(())
        }

        async fn get_android_app_by_id(
            &self,
            _ctx: &OpContext,
            app_id: &str,
        ) -> UpdaterResult<AppInfo> {
            let version = self
                .versions
                .get(app_id)
                .ok_or_else(|| UpdaterError::ApplicationNotFound(app_id.to_string()))?;
            Ok(AppInfo {
                app_id: app_id.to_string(),
                bundle_id: app_id.to_string(),
                version: version.clone(),
                ..AppInfo::default()
            })
        }
    }

    #[derive(Default)]
    struct FakeSettings {
        rows: HashMap<String, PcrdSetting>,
    }

    #[async_trait]
    impl SettingRepository for FakeSettings {
        async fn health_check(&self, _ctx: &OpContext) -> UpdaterResult<()> {
            Ok(())
        }

        async fn get_setting_by_id(
            &self,
            _ctx: &OpContext,
            id: &str,
        ) -> UpdaterResult<PcrdSetting> {
            self.rows
                .get(id)
                .cloned()
                .ok_or_else(|| UpdaterError::SettingNotExists(id.to_string()))
        }
    }

    /// 内存版本存储，更新时按 updated_at 比对
    #[derive(Default)]
    struct FakeVersions {
        rows: Mutex<HashMap<String, GameVersion>>,
        creates: Mutex<Vec<GameVersion>>,
        updates: Mutex<Vec<GameVersion>>,
    }

    #[async_trait]
    impl VersionRepository for FakeVersions {
        async fn health_check(&self, _ctx: &OpContext) -> UpdaterResult<()> {
            Ok(())
        }

        async fn get_by_id(
            &self,
            _ctx: &OpContext,
            setting_id: &str,
        ) -> UpdaterResult<GameVersion> {
            self.rows
                .lock()
                .unwrap()
                .get(setting_id)
                .cloned()
                .ok_or_else(|| UpdaterError::VersionNotFound(setting_id.to_string()))
        }

        async fn create(&self, _ctx: &OpContext, version: &GameVersion) -> UpdaterResult<()> {
            self.creates.lock().unwrap().push(version.clone());
            self.rows
                .lock()
                .unwrap()
                .insert(version.setting_id.clone(), version.clone());
            Ok(())
        }

        async fn update(
            &self,
            _ctx: &OpContext,
            version: &GameVersion,
        ) -> UpdaterResult<GameVersion> {
            let mut rows = self.rows.lock().unwrap();
            let Some(row) = rows.get_mut(&version.setting_id) else {
                return Err(UpdaterError::VersionNotFound(version.setting_id.clone()));
            };
            if row.updated_at != version.updated_at {
                return Err(UpdaterError::VersionConflict(version.setting_id.clone()));
            }
            *row = GameVersion {
                updated_at: version.updated_at + chrono::Duration::milliseconds(1),
                ..version.clone()
            };
            self.updates.lock().unwrap().push(row.clone());
            Ok(row.clone())
        }
    }

    #[derive(Default)]
    struct FakeHistories {
        rows: Mutex<Vec<GameVersion>>,
    }

    #[async_trait]
    impl HistoryRepository for FakeHistories {
        async fn health_check(&self, _ctx: &OpContext) -> UpdaterResult<()> {
            Ok(())
        }

        async fn create(&self, _ctx: &OpContext, version: &GameVersion) -> UpdaterResult<()> {
            self.rows.lock().unwrap().push(version.clone());
            Ok(())
        }
    }

    struct FakeTh {
        result: UpdaterResult<String>,
        requests: Mutex<Vec<PcrdVersion>>,
    }

    impl FakeTh {
        fn returning(result: UpdaterResult<String>) -> Self {
            Self {
                result,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PcrdThRepository for FakeTh {
        async fn health_check(&self, _ctx: &OpContext) -> UpdaterResult<()> {
            Ok(())
        }

        async fn get_resource_version(
            &self,
            _ctx: &OpContext,
            _credential: &Credential,
            version: &PcrdVersion,
        ) -> UpdaterResult<String> {
            self.requests.lock().unwrap().push(version.clone());
            self.result.clone()
        }
    }

    /// 日服假后端：返回起点之上最后一个存在的候选
    struct FakeJp {
        existing: HashSet<i64>,
        starts: Mutex<Vec<String>>,
        healthy: bool,
    }

    impl FakeJp {
        fn new(existing: &[i64]) -> Self {
            Self {
                existing: existing.iter().copied().collect(),
                starts: Mutex::new(Vec::new()),
                healthy: true,
            }
        }
    }

    #[async_trait]
    impl PcrdJpRepository for FakeJp {
        async fn health_check(&self, _ctx: &OpContext) -> UpdaterResult<()> {
            if self.healthy {
                Ok(())
            } else {
                Err(UpdaterError::RetrieveData("cdn down".to_string()))
            }
        }

        async fn get_resource_version(
            &self,
            _ctx: &OpContext,
            start_version: &str,
        ) -> UpdaterResult<String> {
            self.starts.lock().unwrap().push(start_version.to_string());
            let start: i64 = start_version
                .parse()
                .map_err(|_| UpdaterError::RetrieveData(start_version.to_string()))?;
            let found = (1..=19)
                .map(|i| start + 10 * i)
                .filter(|v| self.existing.contains(v))
                .last()
                .unwrap_or(start);
            Ok(found.to_string())
        }
    }

    struct FakeEvents {
        published: Mutex<Vec<GameVersion>>,
        fail: bool,
    }

    impl FakeEvents {
        fn new(fail: bool) -> Self {
            Self {
                published: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl VersionEventRepository for FakeEvents {
        async fn publish_version(
            &self,
            _ctx: &OpContext,
            version: &GameVersion,
        ) -> UpdaterResult<()> {
            self.published.lock().unwrap().push(version.clone());
            if self.fail {
                return Err(UpdaterError::VersionPublish("broker down".to_string()));
            }
            Ok(())
        }
    }

    struct Harness {
        versions: Arc<FakeVersions>,
        histories: Arc<FakeHistories>,
        th: Arc<FakeTh>,
        jp: Arc<FakeJp>,
        events: Arc<FakeEvents>,
        updater: ResourceVersionUpdater,
    }

    fn setting(id: &str, server_code: ServerCode, guess: &str) -> PcrdSetting {
        PcrdSetting {
            setting: Setting {
                id: id.to_string(),
                server_code,
            },
            credential: Credential {
                udid: "udid-1".to_string(),
                short_udid: 1,
                viewer_id: 1000,
                session_id: String::new(),
            },
            guess_start_version: guess.to_string(),
        }
    }

    fn harness(settings: Vec<PcrdSetting>, th: FakeTh, jp: FakeJp, events: FakeEvents) -> Harness {
        let applications = FakeApplications {
            versions: settings
                .iter()
                .map(|s| (s.setting.id.clone(), "2.9.0".to_string()))
                .collect(),
        };
        let settings = FakeSettings {
            rows: settings
                .into_iter()
                .map(|s| (s.setting.id.clone(), s))
                .collect(),
        };
        let versions = Arc::new(FakeVersions::default());
        let histories = Arc::new(FakeHistories::default());
        let th = Arc::new(th);
        let jp = Arc::new(jp);
        let events = Arc::new(events);

        let updater = ResourceVersionUpdater::new(
            Arc::new(applications),
            Arc::new(settings),
            versions.clone(),
            histories.clone(),
            th.clone(),
            jp.clone(),
            events.clone(),
        );
        Harness {
            versions,
            histories,
            th,
            jp,
            events,
            updater,
        }
    }

    fn stored(id: &str, server_code: ServerCode, res: &str) -> GameVersion {
        let mut v = GameVersion::initial(
            &Setting {
                id: id.to_string(),
                server_code,
            },
            "2.8.0",
            now_millis(),
        );
        v.res_version = res.to_string();
        v
    }

    #[tokio::test]
    async fn th_first_run_creates_updates_and_publishes() {
        let h = harness(
            vec![setting("s1", ServerCode::Th, "")],
            FakeTh::returning(Ok("12345".to_string())),
            FakeJp::new(&[]),
            FakeEvents::new(false),
        );

        let outcome = h
            .updater
            .resolve_and_publish(&OpContext::new(), "s1")
            .await
            .unwrap();

        let creates = h.versions.creates.lock().unwrap();
        assert_eq!(creates.len(), 1);
        assert_eq!(creates[0].res_version, "");
        assert_eq!(creates[0].app_version, "2.9.0");

        let ResolveOutcome::Updated { previous, current } = outcome else {
            panic!("expected update");
        };
        assert_eq!(previous.res_version, "");
        assert_eq!(current.res_version, "12345");
        assert_eq!(current.server_code, ServerCode::Th);

        assert_eq!(h.versions.updates.lock().unwrap().len(), 1);
        assert_eq!(h.histories.rows.lock().unwrap().clone(), vec![current.clone()]);
        assert_eq!(h.events.published.lock().unwrap().clone(), vec![current]);

        let requests = h.th.requests.lock().unwrap();
        assert_eq!(requests[0].app_version, "2.9.0");
    }

    #[tokio::test]
    async fn second_run_with_same_version_writes_nothing() {
        let h = harness(
            vec![setting("s1", ServerCode::Th, "")],
            FakeTh::returning(Ok("12345".to_string())),
            FakeJp::new(&[]),
            FakeEvents::new(false),
        );
        let ctx = OpContext::new();

        h.updater.resolve_and_publish(&ctx, "s1").await.unwrap();
        let outcome = h.updater.resolve_and_publish(&ctx, "s1").await.unwrap();

        assert!(!outcome.is_updated());
        assert_eq!(outcome.version().res_version, "12345");
        assert_eq!(h.versions.creates.lock().unwrap().len(), 1);
        assert_eq!(h.versions.updates.lock().unwrap().len(), 1);
        assert_eq!(h.histories.rows.lock().unwrap().len(), 1);
        assert_eq!(h.events.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn jp_probe_starts_from_stored_version() {
        let h = harness(
            vec![setting("s2", ServerCode::Jp, "900")],
            FakeTh::returning(Err(UpdaterError::ResVersionUnavailable)),
            FakeJp::new(&[1050, 1070]),
            FakeEvents::new(false),
        );
        h.versions
            .rows
            .lock()
            .unwrap()
            .insert("s2".to_string(), stored("s2", ServerCode::Jp, "1000"));

        let outcome = h
            .updater
            .resolve_and_publish(&OpContext::new(), "s2")
            .await
            .unwrap();

        assert_eq!(h.jp.starts.lock().unwrap().clone(), vec!["1000".to_string()]);
        assert_eq!(outcome.version().res_version, "1070");
        assert_eq!(outcome.version().app_version, "2.9.0");
        assert!(h.th.requests.lock().unwrap().is_empty());
        assert_eq!(h.histories.rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn jp_first_run_starts_from_guess_version() {
        let h = harness(
            vec![setting("s2", ServerCode::Jp, "10027300")],
            FakeTh::returning(Err(UpdaterError::ResVersionUnavailable)),
            FakeJp::new(&[10027310]),
            FakeEvents::new(false),
        );

        let outcome = h
            .updater
            .resolve_and_publish(&OpContext::new(), "s2")
            .await
            .unwrap();

        assert_eq!(
            h.jp.starts.lock().unwrap().clone(),
            vec!["10027300".to_string()]
        );
        assert_eq!(outcome.version().res_version, "10027310");
    }

    #[tokio::test]
    async fn missing_setting_fails_without_writes() {
        let h = harness(
            vec![],
            FakeTh::returning(Ok("12345".to_string())),
            FakeJp::new(&[]),
            FakeEvents::new(false),
        );

        let err = h
            .updater
            .resolve_and_publish(&OpContext::new(), "nope")
            .await
            .unwrap_err();

        assert_eq!(err.stage, ResolveStage::LoadSetting);
        assert_eq!(err.kind(), &UpdaterError::SettingNotExists("nope".to_string()));
        assert!(h.versions.creates.lock().unwrap().is_empty());
        assert!(h.versions.updates.lock().unwrap().is_empty());
        assert!(h.histories.rows.lock().unwrap().is_empty());
        assert!(h.events.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn discovery_failure_leaves_stored_version_untouched() {
        let h = harness(
            vec![setting("s1", ServerCode::Th, "")],
            FakeTh::returning(Err(UpdaterError::RetrieveData("HTTP 错误 500".to_string()))),
            FakeJp::new(&[]),
            FakeEvents::new(false),
        );
        let existing = stored("s1", ServerCode::Th, "12000");
        h.versions
            .rows
            .lock()
            .unwrap()
            .insert("s1".to_string(), existing.clone());

        let err = h
            .updater
            .resolve_and_publish(&OpContext::new(), "s1")
            .await
            .unwrap_err();

        assert_eq!(err.stage, ResolveStage::Discover);
        assert!(matches!(err.kind(), UpdaterError::RetrieveData(_)));
        assert_eq!(h.versions.rows.lock().unwrap()["s1"], existing);
        assert!(h.histories.rows.lock().unwrap().is_empty());
        assert!(h.events.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn publish_failure_keeps_update_and_history() {
        let h = harness(
            vec![setting("s1", ServerCode::Th, "")],
            FakeTh::returning(Ok("12345".to_string())),
            FakeJp::new(&[]),
            FakeEvents::new(true),
        );

        let err = h
            .updater
            .resolve_and_publish(&OpContext::new(), "s1")
            .await
            .unwrap_err();

        assert_eq!(err.stage, ResolveStage::Publish);
        assert!(matches!(err.kind(), UpdaterError::VersionPublish(_)));
        assert_eq!(h.versions.rows.lock().unwrap()["s1"].res_version, "12345");
        assert_eq!(h.histories.rows.lock().unwrap().len(), 1);
    }

    /// 在发现阶段修改版本行，模拟并发运行抢先写入
    struct RacingTh {
        versions: Arc<FakeVersions>,
    }

    #[async_trait]
    impl PcrdThRepository for RacingTh {
        async fn health_check(&self, _ctx: &OpContext) -> UpdaterResult<()> {
            Ok(())
        }

        async fn get_resource_version(
            &self,
            ctx: &OpContext,
            _credential: &Credential,
            _version: &PcrdVersion,
        ) -> UpdaterResult<String> {
            let mut winner = self.versions.get_by_id(ctx, "s1").await?;
            winner.res_version = "12346".to_string();
            self.versions.update(ctx, &winner).await?;
            Ok("12345".to_string())
        }
    }

    #[tokio::test]
    async fn lost_race_is_conflict_without_history_or_event() {
        let versions = Arc::new(FakeVersions::default());
        versions
            .rows
            .lock()
            .unwrap()
            .insert("s1".to_string(), stored("s1", ServerCode::Th, "12000"));
        let histories = Arc::new(FakeHistories::default());
        let events = Arc::new(FakeEvents::new(false));
        let updater = ResourceVersionUpdater::new(
            Arc::new(FakeApplications {
                versions: HashMap::from([("s1".to_string(), "2.9.0".to_string())]),
            }),
            Arc::new(FakeSettings {
                rows: HashMap::from([("s1".to_string(), setting("s1", ServerCode::Th, ""))]),
            }),
            versions.clone(),
            histories.clone(),
            Arc::new(RacingTh {
                versions: versions.clone(),
            }),
            Arc::new(FakeJp::new(&[])),
            events.clone(),
        );

        let err = updater
            .resolve_and_publish(&OpContext::new(), "s1")
            .await
            .unwrap_err();

        assert_eq!(err.stage, ResolveStage::UpdateVersion);
        assert_eq!(err.kind(), &UpdaterError::VersionConflict("s1".to_string()));
        assert_eq!(versions.rows.lock().unwrap()["s1"].res_version, "12346");
        assert!(histories.rows.lock().unwrap().is_empty());
        assert!(events.published.lock().unwrap().is_empty());
    }

    /// 版本行提交后立即取消本次运行
    struct CancelAfterUpdate {
        inner: VersionDao,
    }

    #[async_trait]
    impl VersionRepository for CancelAfterUpdate {
        async fn health_check(&self, ctx: &OpContext) -> UpdaterResult<()> {
            self.inner.health_check(ctx).await
        }

        async fn get_by_id(
            &self,
            ctx: &OpContext,
            setting_id: &str,
        ) -> UpdaterResult<GameVersion> {
            self.inner.get_by_id(ctx, setting_id).await
        }

        async fn create(&self, ctx: &OpContext, version: &GameVersion) -> UpdaterResult<()> {
            self.inner.create(ctx, version).await
        }

        async fn update(
            &self,
            ctx: &OpContext,
            version: &GameVersion,
        ) -> UpdaterResult<GameVersion> {
            let stored = self.inner.update(ctx, version).await?;
            ctx.cancellation().cancel();
            Ok(stored)
        }
    }

    #[tokio::test]
    async fn cancellation_after_version_write_still_records_history_and_event() {
        let db = create_sqlite_pool_with_migration("sqlite::memory:")
            .await
            .unwrap();
        let histories = Arc::new(HistoryDao::new(db.clone()));
        let events = Arc::new(FakeEvents::new(false));
        let updater = ResourceVersionUpdater::new(
            Arc::new(FakeApplications {
                versions: HashMap::from([("s1".to_string(), "2.9.0".to_string())]),
            }),
            Arc::new(FakeSettings {
                rows: HashMap::from([("s1".to_string(), setting("s1", ServerCode::Th, ""))]),
            }),
            Arc::new(CancelAfterUpdate {
                inner: VersionDao::new(db.clone()),
            }),
            histories.clone(),
            Arc::new(FakeTh::returning(Ok("12345".to_string()))),
            Arc::new(FakeJp::new(&[])),
            events.clone(),
        );
        let ctx = OpContext::new();

        let outcome = updater.resolve_and_publish(&ctx, "s1").await.unwrap();

        assert!(ctx.is_cancelled());
        assert_eq!(outcome.version().res_version, "12345");
        let history = histories.list_by_setting("s1", 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].res_version, "12345");
        assert_eq!(events.published.lock().unwrap().len(), 1);

        let again = updater
            .resolve_and_publish(&OpContext::new(), "s1")
            .await
            .unwrap();
        assert!(!again.is_updated());
        assert_eq!(histories.list_by_setting("s1", 10).await.unwrap().len(), 1);
    }

    /// 发现阶段结束前取消本次运行
    struct CancellingTh;

    #[async_trait]
    impl PcrdThRepository for CancellingTh {
        async fn health_check(&self, _ctx: &OpContext) -> UpdaterResult<()> {
            Ok(())
        }

        async fn get_resource_version(
            &self,
            ctx: &OpContext,
            _credential: &Credential,
            _version: &PcrdVersion,
        ) -> UpdaterResult<String> {
            ctx.cancellation().cancel();
            Ok("12345".to_string())
        }
    }

    #[tokio::test]
    async fn cancellation_before_writes_leaves_version_untouched() {
        let versions = Arc::new(FakeVersions::default());
        let existing = stored("s1", ServerCode::Th, "12000");
        versions
            .rows
            .lock()
            .unwrap()
            .insert("s1".to_string(), existing.clone());
        let histories = Arc::new(FakeHistories::default());
        let events = Arc::new(FakeEvents::new(false));
        let updater = ResourceVersionUpdater::new(
            Arc::new(FakeApplications {
                versions: HashMap::from([("s1".to_string(), "2.9.0".to_string())]),
            }),
            Arc::new(FakeSettings {
                rows: HashMap::from([("s1".to_string(), setting("s1", ServerCode::Th, ""))]),
            }),
            versions.clone(),
            histories.clone(),
            Arc::new(CancellingTh),
            Arc::new(FakeJp::new(&[])),
            events.clone(),
        );

        let err = updater
            .resolve_and_publish(&OpContext::new(), "s1")
            .await
            .unwrap_err();

        assert_eq!(err.stage, ResolveStage::UpdateVersion);
        assert_eq!(err.kind(), &UpdaterError::Cancelled);
        assert_eq!(versions.rows.lock().unwrap()["s1"], existing);
        assert!(versions.updates.lock().unwrap().is_empty());
        assert!(histories.rows.lock().unwrap().is_empty());
        assert!(events.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn jp_first_run_without_newer_manifest_records_guess_version() {
        let h = harness(
            vec![setting("s2", ServerCode::Jp, "10027300")],
            FakeTh::returning(Err(UpdaterError::ResVersionUnavailable)),
            FakeJp::new(&[]),
            FakeEvents::new(false),
        );

        let outcome = h
            .updater
            .resolve_and_publish(&OpContext::new(), "s2")
            .await
            .unwrap();

        // 起始版本本身视为已知版本：从空值写为起始版本并发布
        let ResolveOutcome::Updated { previous, current } = outcome else {
            panic!("expected update");
        };
        assert_eq!(previous.res_version, "");
        assert_eq!(current.res_version, "10027300");
        assert_eq!(h.histories.rows.lock().unwrap().len(), 1);
        assert_eq!(h.events.published.lock().unwrap().len(), 1);

        let again = h
            .updater
            .resolve_and_publish(&OpContext::new(), "s2")
            .await
            .unwrap();
        assert!(!again.is_updated());
        assert_eq!(
            h.jp.starts.lock().unwrap().clone(),
            vec!["10027300".to_string(), "10027300".to_string()]
        );
    }

    #[tokio::test]
    async fn health_check_reports_first_failure() {
        let mut jp = FakeJp::new(&[]);
        jp.healthy = false;
        let h = harness(
            vec![],
            FakeTh::returning(Ok(String::new())),
            jp,
            FakeEvents::new(false),
        );

        let err = h.updater.health_check(&OpContext::new()).await.unwrap_err();
        assert_eq!(err, UpdaterError::RetrieveData("cdn down".to_string()));
    }
}
