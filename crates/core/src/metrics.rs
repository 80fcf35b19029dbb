//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! collector는 이 상수로 `metrics::counter!()`, `metrics::gauge!()`를 호출하고,
//! 레코더가 설치되지 않았으면 호출은 아무 일도 하지 않습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logkeep_`
//! - 접미어: `_total` (counter), `_bytes_total` (바이트 counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(logkeep_core::metrics::COLLECTOR_ROTATIONS_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 스트림 레이블 키 (stdout, stderr)
pub const LABEL_STREAM: &str = "stream";

/// 종료 사유 레이블 키 (clean, cancelled, attach_failed, stream_error, write_failed)
pub const LABEL_REASON: &str = "reason";

// ─── Collector 메트릭 ──────────────────────────────────────────────

/// Collector: 로그 파일에 기록된 바이트 수 (counter, label: stream)
pub const COLLECTOR_BYTES_WRITTEN_TOTAL: &str = "logkeep_collector_bytes_written_total";

/// Collector: 로그 파일 로테이션 횟수 (counter)
pub const COLLECTOR_ROTATIONS_TOTAL: &str = "logkeep_collector_rotations_total";

/// Collector: 로테이션 부수 작업(압축, 정리) 실패 수 (counter)
pub const COLLECTOR_ROTATION_FAILURES_TOTAL: &str = "logkeep_collector_rotation_failures_total";

/// Collector: 현재 활성 copier 수 (gauge)
pub const COLLECTOR_ACTIVE_COPIERS: &str = "logkeep_collector_active_copiers";

/// Collector: 종료된 copier 수 (counter, label: reason)
pub const COLLECTOR_COPIERS_CLOSED_TOTAL: &str = "logkeep_collector_copiers_closed_total";

/// Collector: 로그 스트림 연결 실패 수 (counter)
pub const COLLECTOR_ATTACH_FAILURES_TOTAL: &str = "logkeep_collector_attach_failures_total";

/// Collector: 이벤트 스트림 전달 에러 수 (counter)
pub const COLLECTOR_EVENT_ERRORS_TOTAL: &str = "logkeep_collector_event_errors_total";

/// Collector: 무시되거나 지연된 중복 시작 요청 수 (counter)
pub const COLLECTOR_DUPLICATE_REQUESTS_TOTAL: &str = "logkeep_collector_duplicate_requests_total";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "logkeep_daemon_build_info";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        COLLECTOR_BYTES_WRITTEN_TOTAL,
        "Total bytes of container output written to log files"
    );
    describe_counter!(
        COLLECTOR_ROTATIONS_TOTAL,
        "Total number of log file rotations"
    );
    describe_counter!(
        COLLECTOR_ROTATION_FAILURES_TOTAL,
        "Total number of failed rotation housekeeping steps (rename, compress, prune)"
    );
    describe_gauge!(
        COLLECTOR_ACTIVE_COPIERS,
        "Number of containers currently being streamed to disk"
    );
    describe_counter!(
        COLLECTOR_COPIERS_CLOSED_TOTAL,
        "Total number of finished copiers by close reason"
    );
    describe_counter!(
        COLLECTOR_ATTACH_FAILURES_TOTAL,
        "Total number of failed log stream attachments"
    );
    describe_counter!(
        COLLECTOR_EVENT_ERRORS_TOTAL,
        "Total number of container event delivery errors"
    );
    describe_counter!(
        COLLECTOR_DUPLICATE_REQUESTS_TOTAL,
        "Total number of start requests for containers already being logged"
    );
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        COLLECTOR_BYTES_WRITTEN_TOTAL,
        COLLECTOR_ROTATIONS_TOTAL,
        COLLECTOR_ROTATION_FAILURES_TOTAL,
        COLLECTOR_ACTIVE_COPIERS,
        COLLECTOR_COPIERS_CLOSED_TOTAL,
        COLLECTOR_ATTACH_FAILURES_TOTAL,
        COLLECTOR_EVENT_ERRORS_TOTAL,
        COLLECTOR_DUPLICATE_REQUESTS_TOTAL,
        DAEMON_BUILD_INFO,
    ];

    #[test]
    fn all_metrics_start_with_logkeep_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("logkeep_"),
                "Metric '{}' does not start with 'logkeep_' prefix",
                name
            );
        }
    }

    #[test]
    fn counters_end_with_total() {
        for name in ALL_METRIC_NAMES {
            if *name == COLLECTOR_ACTIVE_COPIERS || *name == DAEMON_BUILD_INFO {
                continue;
            }
            assert!(name.ends_with("_total"), "counter '{}' lacks _total", name);
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        for label in [LABEL_STREAM, LABEL_REASON] {
            assert_eq!(label.to_lowercase(), label);
        }
    }
}
