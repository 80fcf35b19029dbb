//! 로테이션 파일 싱크
//!
//! [`RotatingSink`]는 하나의 로그 파일 경로에 묶인 쓰기 전용 바이트 싱크입니다.
//! 크기 임계값을 넘기 전에 활성 파일을 백업으로 돌리고, 백업을 gzip으로 압축하며,
//! 개수와 보관 기간을 넘은 백업을 정리합니다.
//!
//! # 파일 배치
//!
//! ```text
//! {dir}/web.log                                  활성 파일
//! {dir}/web-2024-05-01T12-00-00.123.log.gz       백업 (UTC, 밀리초)
//! ```
//!
//! 백업 타임스탬프는 싱크마다 엄격히 증가하므로 이름 순서가 곧 로테이션 순서입니다.
//!
//! # 실패 처리
//!
//! - 활성 파일 열기/쓰기 실패: [`CollectorError::Sink`] 반환
//! - 이름 변경, 압축, 정리 실패: 경고 로그 후 쓰기는 계속

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, NaiveDateTime, Utc};
use logkeep_core::metrics as m;
use logkeep_core::types::RotationPolicy;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::CollectorError;

/// 백업 파일 이름의 타임스탬프 형식
const BACKUP_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3f";

/// 압축 백업 확장자
const GZ_EXT: &str = ".gz";

/// 크기/개수/기간 기반 로테이션 파일 싱크
///
/// `write`는 `&mut self`를 받으므로 한 번에 하나의 작성자만 존재합니다.
/// 태스크 간 배타성은 supervisor의 레지스트리가 보장합니다.
pub struct RotatingSink {
    path: PathBuf,
    dir: PathBuf,
    stem: String,
    ext: String,
    policy: RotationPolicy,
    file: Option<File>,
    size: u64,
    last_backup_millis: Option<i64>,
}

impl RotatingSink {
    /// 활성 파일을 추가 모드로 엽니다. 기존 파일이 있으면 크기를 이어서 셉니다.
    pub async fn open(
        path: impl Into<PathBuf>,
        policy: RotationPolicy,
    ) -> Result<Self, CollectorError> {
        let path = path.into();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        if stem.is_empty() {
            return Err(sink_error(&path, "log path has no file name"));
        }

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| sink_error(&path, format!("failed to create log directory: {e}")))?;

        let mut sink = Self {
            path,
            dir,
            stem,
            ext,
            policy,
            file: None,
            size: 0,
            last_backup_millis: None,
        };
        sink.open_live().await?;
        Ok(sink)
    }

    /// 활성 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 현재 활성 파일에 기록된 바이트 수
    pub fn size(&self) -> u64 {
        self.size
    }

    /// 바이트를 기록합니다.
    ///
    /// 기록하면 임계값을 넘는 경우 먼저 로테이션하고 새 파일에 기록합니다.
    /// 임계값보다 큰 청크는 활성 파일을 임계값까지 채운 뒤 로테이션하고
    /// 나머지를 이어서 기록합니다. 바이트는 버려지지 않습니다.
    pub async fn write(&mut self, buf: &[u8]) -> Result<usize, CollectorError> {
        let max = self.policy.max_size_bytes.max(1);
        let mut remaining = buf;

        while !remaining.is_empty() {
            let room = max.saturating_sub(self.size);
            let len = remaining.len() as u64;

            if room == 0 {
                self.rotate().await?;
                continue;
            }

            if len <= room {
                self.write_live(remaining).await?;
                break;
            }

            if self.size > 0 && len <= max {
                self.rotate().await?;
                continue;
            }

            let (head, tail) = remaining.split_at(usize::try_from(room).unwrap_or(usize::MAX));
            self.write_live(head).await?;
            remaining = tail;
        }

        Ok(buf.len())
    }

    /// 버퍼된 데이터를 디스크로 내보냅니다.
    pub async fn flush(&mut self) -> Result<(), CollectorError> {
        if let Some(file) = self.file.as_mut() {
            file.flush()
                .await
                .map_err(|e| sink_error(&self.path, format!("flush failed: {e}")))?;
        }
        Ok(())
    }

    /// 파일을 플러시하고 닫습니다. 이후 `write`는 파일을 다시 엽니다.
    pub async fn close(&mut self) -> Result<(), CollectorError> {
        if let Some(mut file) = self.file.take() {
            file.flush()
                .await
                .map_err(|e| sink_error(&self.path, format!("flush failed: {e}")))?;
            file.sync_data()
                .await
                .map_err(|e| sink_error(&self.path, format!("sync failed: {e}")))?;
        }
        Ok(())
    }

    /// 이 싱크의 백업 파일 목록을 오래된 순서로 반환합니다.
    pub async fn backups(&self) -> Result<Vec<PathBuf>, CollectorError> {
        let mut found = self
            .scan_backups()
            .await
            .map_err(|e| sink_error(&self.path, format!("failed to list backups: {e}")))?;
        found.sort_by_key(|(time, _)| *time);
        Ok(found.into_iter().map(|(_, path)| path).collect())
    }

    async fn open_live(&mut self) -> Result<(), CollectorError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| sink_error(&self.path, format!("open failed: {e}")))?;
        self.size = file.metadata().await.map(|meta| meta.len()).unwrap_or(0);
        self.file = Some(file);
        Ok(())
    }

    async fn write_live(&mut self, bytes: &[u8]) -> Result<(), CollectorError> {
        if self.file.is_none() {
            self.open_live().await?;
        }
        let Some(file) = self.file.as_mut() else {
            return Err(sink_error(&self.path, "log file is not open"));
        };
        file.write_all(bytes)
            .await
            .map_err(|e| sink_error(&self.path, format!("write failed: {e}")))?;
        file.flush()
            .await
            .map_err(|e| sink_error(&self.path, format!("flush failed: {e}")))?;
        self.size += bytes.len() as u64;
        Ok(())
    }

    async fn rotate(&mut self) -> Result<(), CollectorError> {
        if let Some(mut file) = self.file.take() {
            if let Err(e) = file.flush().await {
                warn!(path = %self.path.display(), error = %e, "flush before rotation failed");
            }
        }

        let backup = self.next_backup_path().await;
        let renamed = match tokio::fs::rename(&self.path, &backup).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    backup = %backup.display(),
                    error = %e,
                    "failed to rename log file, continuing in place"
                );
                metrics::counter!(m::COLLECTOR_ROTATION_FAILURES_TOTAL).increment(1);
                false
            }
        };

        self.open_live().await?;
        // 이름 변경에 실패해도 같은 파일에 이어 쓰고 다음 임계값까지 다시 센다
        self.size = 0;

        if !renamed {
            return Ok(());
        }

        metrics::counter!(m::COLLECTOR_ROTATIONS_TOTAL).increment(1);
        info!(path = %self.path.display(), backup = %backup.display(), "rotated log file");

        if self.policy.compress {
            self.compress_backup(backup).await;
        }
        self.prune().await;
        Ok(())
    }

    async fn next_backup_path(&mut self) -> PathBuf {
        let mut millis = Utc::now().timestamp_millis();
        if let Some(last) = self.last_backup_millis {
            if millis <= last {
                millis = last + 1;
            }
        }

        loop {
            let stamp = DateTime::<Utc>::from_timestamp_millis(millis)
                .unwrap_or_else(Utc::now)
                .format(BACKUP_TIME_FORMAT);
            let candidate = self
                .dir
                .join(format!("{}-{}{}", self.stem, stamp, self.ext));
            let compressed = append_ext(&candidate, GZ_EXT);
            let taken = tokio::fs::try_exists(&candidate).await.unwrap_or(false)
                || tokio::fs::try_exists(&compressed).await.unwrap_or(false);
            if !taken {
                self.last_backup_millis = Some(millis);
                return candidate;
            }
            millis += 1;
        }
    }

    async fn compress_backup(&self, backup: PathBuf) {
        let target = append_ext(&backup, GZ_EXT);
        let src = backup.clone();
        let dst = target.clone();
        let result = tokio::task::spawn_blocking(move || compress_file(&src, &dst)).await;

        match result {
            Ok(Ok(())) => debug!(backup = %target.display(), "compressed rotated log"),
            Ok(Err(e)) => {
                warn!(backup = %backup.display(), error = %e, "failed to compress rotated log");
                metrics::counter!(m::COLLECTOR_ROTATION_FAILURES_TOTAL).increment(1);
            }
            Err(e) => {
                warn!(backup = %backup.display(), error = %e, "compression task failed");
                metrics::counter!(m::COLLECTOR_ROTATION_FAILURES_TOTAL).increment(1);
            }
        }
    }

    /// 개수와 보관 기간을 넘은 백업을 삭제합니다.
    async fn prune(&self) {
        let mut found = match self.scan_backups().await {
            Ok(found) => found,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "failed to list backups for pruning");
                metrics::counter!(m::COLLECTOR_ROTATION_FAILURES_TOTAL).increment(1);
                return;
            }
        };
        // 최신 순
        found.sort_by(|a, b| b.0.cmp(&a.0));

        let mut doomed = Vec::new();
        if self.policy.max_backups > 0 && found.len() > self.policy.max_backups {
            doomed.extend(found.drain(self.policy.max_backups..).map(|(_, p)| p));
        }

        if !self.policy.max_age.is_zero() {
            let cutoff = SystemTime::now()
                .checked_sub(self.policy.max_age)
                .unwrap_or(SystemTime::UNIX_EPOCH);
            for (_, path) in found {
                let modified = tokio::fs::metadata(&path)
                    .await
                    .and_then(|meta| meta.modified());
                if matches!(modified, Ok(mtime) if mtime < cutoff) {
                    doomed.push(path);
                }
            }
        }

        for path in doomed {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(backup = %path.display(), "removed old backup"),
                Err(e) => {
                    warn!(backup = %path.display(), error = %e, "failed to remove old backup");
                    metrics::counter!(m::COLLECTOR_ROTATION_FAILURES_TOTAL).increment(1);
                }
            }
        }
    }

    /// 디렉토리에서 이 싱크의 백업을 찾아 이름의 타임스탬프와 함께 반환합니다.
    async fn scan_backups(&self) -> std::io::Result<Vec<(NaiveDateTime, PathBuf)>> {
        let mut found = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(time) = parse_backup_time(name, &self.stem, &self.ext) {
                found.push((time, entry.path()));
            }
        }
        Ok(found)
    }
}

/// `{stem}-{timestamp}{ext}[.gz]` 형식이면 타임스탬프를 반환합니다.
fn parse_backup_time(file_name: &str, stem: &str, ext: &str) -> Option<NaiveDateTime> {
    let rest = file_name.strip_prefix(stem)?.strip_prefix('-')?;
    let rest = rest.strip_suffix(GZ_EXT).unwrap_or(rest);
    let stamp = rest.strip_suffix(ext)?;
    NaiveDateTime::parse_from_str(stamp, BACKUP_TIME_FORMAT).ok()
}

fn append_ext(path: &Path, ext: &str) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(ext);
    PathBuf::from(os)
}

/// `src`를 gzip으로 `dst`에 쓰고 원본을 지웁니다. 압축본은 원본의 수정 시각을 유지합니다.
fn compress_file(src: &Path, dst: &Path) -> std::io::Result<()> {
    use flate2::Compression;
    use flate2::write::GzEncoder;

    let result = (|| -> std::io::Result<()> {
        let mut input = std::fs::File::open(src)?;
        let modified = input.metadata()?.modified()?;
        let output = std::fs::File::create(dst)?;
        let mut encoder = GzEncoder::new(output, Compression::default());
        std::io::copy(&mut input, &mut encoder)?;
        let output = encoder.finish()?;
        output.sync_all()?;
        output.set_modified(modified)?;
        Ok(())
    })();

    match result {
        Ok(()) => std::fs::remove_file(src),
        Err(e) => {
            let _ = std::fs::remove_file(dst);
            Err(e)
        }
    }
}

fn sink_error(path: &Path, reason: impl Into<String>) -> CollectorError {
    CollectorError::Sink {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}
