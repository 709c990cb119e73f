use chrono::{DateTime, NaiveTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Minimum age, in whole years, to rent a car.
pub const MIN_RENTAL_AGE: i64 = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "user_role")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[sea_orm(string_value = "user")]
    User,
    #[sea_orm(string_value = "manager")]
    Manager,
    #[sea_orm(string_value = "admin")]
    Admin,
}

impl UserRole {
    /// Managers and admins operate the rental counter.
    pub fn is_staff(self) -> bool {
        matches!(self, UserRole::Manager | UserRole::Admin)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub date_of_birth: Date,
    pub role: UserRole,
    pub is_active: bool,
    pub last_login: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

impl Model {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Age in whole years, counting a year as 365.25 days.
    pub fn age_at(&self, now: DateTime<Utc>) -> i64 {
        let born = self.date_of_birth.and_time(NaiveTime::MIN).and_utc();
        let millis = (now - born).num_milliseconds();
        (millis as f64 / (365.25 * 24.0 * 60.0 * 60.0 * 1000.0)).floor() as i64
    }

    pub fn is_eligible_to_rent(&self, now: DateTime<Utc>) -> bool {
        self.age_at(now) >= MIN_RENTAL_AGE
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::booking::Entity")]
    Bookings,
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    pub(crate) fn sample_user(date_of_birth: NaiveDate) -> Model {
        Model {
            id: Uuid::new_v4(),
            email: "renter@example.com".to_string(),
            password_hash: String::new(),
            first_name: "Alex".to_string(),
            last_name: "Rivera".to_string(),
            phone: "+1555000111".to_string(),
            date_of_birth,
            role: UserRole::User,
            is_active: true,
            last_login: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_eligibility_boundary() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        let old_enough = sample_user(NaiveDate::from_ymd_opt(2004, 1, 1).unwrap());
        assert_eq!(old_enough.age_at(now), 21);
        assert!(old_enough.is_eligible_to_rent(now));

        let too_young = sample_user(NaiveDate::from_ymd_opt(2004, 12, 1).unwrap());
        assert_eq!(too_young.age_at(now), 20);
        assert!(!too_young.is_eligible_to_rent(now));
    }

    #[test]
    fn test_staff_roles() {
        assert!(UserRole::Admin.is_staff());
        assert!(UserRole::Manager.is_staff());
        assert!(!UserRole::User.is_staff());
    }
}
