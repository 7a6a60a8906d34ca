//! 时间工具函数
//!
//! Repository 层和模型统一使用 `i64` Unix millis。

use chrono::Utc;

/// Current Unix time in milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Today's date in `YYYYMMDD` form, used for invoice numbers
pub fn today_yyyymmdd() -> String {
    Utc::now().format("%Y%m%d").to_string()
}
