use sea_orm::entity::prelude::*;
use chrono::{DateTime, Utc};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "pledges")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub test_request_id: Uuid,
    pub user_id: Option<Uuid>,
    pub amount: i64,
    pub payment_method_id: Option<String>,
    pub customer_id: Option<String>,
    pub status: String,                    // pending | charged | failed | cancelled
    pub charged_at: Option<DateTime<Utc>>,
    pub payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::test_request::Entity",
        from = "Column::TestRequestId",
        to = "super::test_request::Column::Id"
    )]
    TestRequest,
}

impl Related<super::test_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TestRequest.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
