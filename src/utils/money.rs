//! KWD 金额工具
//!
//! 所有金额在数据库中以整数 fils (1/1000 KWD) 存储，避免浮点误差。
//! API 与网关边界转换为三位小数的 `Decimal` / 字符串。

use rust_decimal::Decimal;

/// Convert integer fils to a KWD `Decimal` with scale 3
pub fn fils_to_kwd(fils: i64) -> Decimal {
    Decimal::new(fils, 3)
}

/// Format fils as the gateway wire string, always three decimals ("40.000")
pub fn format_kwd(fils: i64) -> String {
    let sign = if fils < 0 { "-" } else { "" };
    let abs = fils.unsigned_abs();
    format!("{}{}.{:03}", sign, abs / 1000, abs % 1000)
}

/// Apply a percentage to an amount, truncating to whole fils
pub fn percent_of(fils: i64, percent: i64) -> i64 {
    fils * percent / 100
}

/// serde adapter: i64 fils <-> scale-3 KWD Decimal in JSON
pub mod kwd {
    use rust_decimal::Decimal;
    use rust_decimal::prelude::ToPrimitive;
    use serde::{Deserializer, Serializer};

    // Decimal 自带同名二进制方法，会遮蔽 serde trait，必须全限定调用
    pub fn serialize<S: Serializer>(fils: &i64, ser: S) -> Result<S::Ok, S::Error> {
        serde::Serialize::serialize(&super::fils_to_kwd(*fils), ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<i64, D::Error> {
        let amount = <Decimal as serde::Deserialize>::deserialize(de)?;
        (amount * Decimal::new(1000, 0))
            .round()
            .to_i64()
            .ok_or_else(|| serde::de::Error::custom("amount out of range"))
    }
}
