pub mod contract {
    use chrono::{DateTime, Utc};
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "contracts")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub ticker: String,

        pub underlying_ticker: String,

        /// `CALL` or `PUT`
        pub contract_type: String,

        pub expiration_date: DateTime<Utc>,

        pub strike_price: f64,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::snapshot::Entity")]
        Snapshots,
    }

    impl Related<super::snapshot::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Snapshots.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod snapshot {
    use chrono::{DateTime, Utc};
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "snapshots")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = true)]
        pub id: i64,

        pub ticker: String,

        #[sea_orm(nullable)]
        pub open_interest: Option<i64>,

        #[sea_orm(nullable)]
        pub volume: Option<f64>,

        #[sea_orm(nullable)]
        pub implied_vol: Option<f64>,

        #[sea_orm(nullable)]
        pub greeks: Option<Json>,

        #[sea_orm(nullable)]
        pub last_price: Option<f64>,

        #[sea_orm(nullable)]
        pub day_open: Option<f64>,

        #[sea_orm(nullable)]
        pub day_close: Option<f64>,

        #[sea_orm(nullable)]
        pub day_change: Option<f64>,

        pub last_updated: DateTime<Utc>,

        pub last_crawled: DateTime<Utc>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::contract::Entity",
            from = "Column::Ticker",
            to = "super::contract::Column::Ticker"
        )]
        Contract,
    }

    impl Related<super::contract::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Contract.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}
