pub use std::{sync::Arc, time::Duration};

pub use chrono::{NaiveDateTime as DateTime, TimeDelta, Utc};
pub use sea_orm::{
  ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
  PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
  TransactionTrait,
};
pub use tracing::{debug, error, info, warn};
pub use uuid::Uuid;

pub use crate::error::{Error, Result};
