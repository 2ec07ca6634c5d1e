//! 规则核心数据模型
//! 仅存储规则数据与记录元信息，无任何业务逻辑，支持序列化/反序列化

pub mod category;
pub mod payload;
pub mod record;

pub use category::{RuleCategory, RuleSource};
pub use payload::{
    CookieRules, DomEntry, DomRuleList, FallbackPattern, LocaleBucket, RulePayload, TermRules,
    WidgetRules,
};
pub use record::{RuleRecord, RuleSetResponse, RuleUpdateEvent};
