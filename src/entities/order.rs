use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub created_at: DateTimeUtc,
    pub total: i64,
    pub status: Status,
    pub payment_method: PaymentMethod,
    #[sea_orm(indexed)]
    pub customer_id: Option<i32>,

    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,

    pub address: String,
    pub region: String,
    pub commune: String,
    pub postal_code: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub address_reference: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,

    pub paid_at: Option<DateTimeUtc>,
    pub shipped_at: Option<DateTimeUtc>,
    pub delivered_at: Option<DateTimeUtc>,
    pub tracking_number: Option<String>,
}

impl Model {
    pub fn is_guest(&self) -> bool {
        self.customer_id.is_none()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    Customer,
    #[sea_orm(has_many = "super::order_line::Entity")]
    OrderLine,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderLine.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(
    enum_name = "order_status",
    db_type = "String(StringLen::N(32))",
    rs_type = "String"
)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[sea_orm(string_value = "pending_payment")]
    PendingPayment,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "preparing")]
    Preparing,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl Status {
    pub fn can_cancel(&self) -> bool {
        matches!(self, Status::PendingPayment | Status::Paid)
    }

    /// Fixed lifecycle: one step forward, or cancellation before preparing.
    pub fn can_transition_to(&self, next: Status) -> bool {
        match (self, next) {
            (Status::PendingPayment, Status::Paid)
            | (Status::Paid, Status::Preparing)
            | (Status::Preparing, Status::Shipped)
            | (Status::Shipped, Status::Completed) => true,
            (current, Status::Cancelled) => current.can_cancel(),
            _ => false,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Status::PendingPayment => "Pendiente de Pago",
            Status::Paid => "Pagado",
            Status::Preparing => "Preparando Envío",
            Status::Shipped => "Enviado",
            Status::Completed => "Completado",
            Status::Cancelled => "Cancelado",
        }
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_payment" => Ok(Self::PendingPayment),
            "paid" => Ok(Self::Paid),
            "preparing" => Ok(Self::Preparing),
            "shipped" => Ok(Self::Shipped),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::PendingPayment => "pending_payment",
            Self::Paid => "paid",
            Self::Preparing => "preparing",
            Self::Shipped => "shipped",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", value)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(
    enum_name = "payment_method",
    db_type = "String(StringLen::N(32))",
    rs_type = "String"
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "transfer")]
    Transfer,
    #[sea_orm(string_value = "webpay")]
    Webpay,
}

impl PaymentMethod {
    pub fn is_accepted(&self) -> bool {
        matches!(self, PaymentMethod::Transfer)
    }
}
