use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_number: String,
    pub user_id: Uuid,
    pub status: String,
    pub payment_method: String,
    pub total: i64,
    // Customer snapshot taken at checkout, decoupled from the user row.
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub customer_document: Option<String>,
    pub delivery_street: String,
    pub delivery_number: Option<String>,
    pub delivery_complement: Option<String>,
    pub delivery_district: Option<String>,
    pub delivery_city: String,
    pub delivery_state: String,
    pub delivery_zip: String,
    pub notes: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    Users,
    #[sea_orm(has_many = "super::order_items::Entity")]
    OrderItems,
    #[sea_orm(has_one = "super::order_feedback::Entity")]
    OrderFeedback,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::order_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::order_feedback::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderFeedback.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
