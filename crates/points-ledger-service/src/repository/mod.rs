//! 数据库仓储层
//!
//! 提供账本、分享和审核记录的数据访问接口，封装 SQL 操作细节。
//!
//! ## 设计原则
//!
//! - 仓储只负责数据持久化，不包含业务逻辑
//! - 事务边界由服务层通过 `PointsStore::begin` 控制
//! - 同一会员的余额读写在事务内按会员加锁串行化
//! - 定义 trait 接口，生产使用 PostgreSQL，测试使用内存实现

mod memory_store;
mod pg_store;
mod traits;

pub use memory_store::{MemoryPointsStore, MemoryPointsTx};
pub use pg_store::{PgPointsStore, PgPointsTx};
pub use traits::*;
