use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Date, Duration, OffsetDateTime};

use super::dto::ContactPayload;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Contact {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub birthday: Date,
    pub additional_info: Option<String>,
}

impl Contact {
    pub async fn create(db: &PgPool, fields: &ContactPayload) -> anyhow::Result<Contact> {
        let contact = sqlx::query_as::<_, Contact>(
            r#"
            INSERT INTO contacts (first_name, last_name, email, phone_number, birthday, additional_info)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, first_name, last_name, email, phone_number, birthday, additional_info
            "#,
        )
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(&fields.email)
        .bind(&fields.phone_number)
        .bind(fields.birthday)
        .bind(&fields.additional_info)
        .fetch_one(db)
        .await?;
        Ok(contact)
    }

    pub async fn list(db: &PgPool, skip: i64, limit: i64) -> anyhow::Result<Vec<Contact>> {
        let rows = sqlx::query_as::<_, Contact>(
            r#"
            SELECT id, first_name, last_name, email, phone_number, birthday, additional_info
            FROM contacts
            ORDER BY id
            OFFSET $1 LIMIT $2
            "#,
        )
        .bind(skip)
        .bind(limit)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn find(db: &PgPool, id: i32) -> anyhow::Result<Option<Contact>> {
        let contact = sqlx::query_as::<_, Contact>(
            r#"
            SELECT id, first_name, last_name, email, phone_number, birthday, additional_info
            FROM contacts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(contact)
    }

    /// Full replace of every field. None when the id does not exist.
    pub async fn update(
        db: &PgPool,
        id: i32,
        fields: &ContactPayload,
    ) -> anyhow::Result<Option<Contact>> {
        let contact = sqlx::query_as::<_, Contact>(
            r#"
            UPDATE contacts
            SET first_name = $2, last_name = $3, email = $4,
                phone_number = $5, birthday = $6, additional_info = $7
            WHERE id = $1
            RETURNING id, first_name, last_name, email, phone_number, birthday, additional_info
            "#,
        )
        .bind(id)
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(&fields.email)
        .bind(&fields.phone_number)
        .bind(fields.birthday)
        .bind(&fields.additional_info)
        .fetch_optional(db)
        .await?;
        Ok(contact)
    }

    /// Delete and return the record's prior state. None when the id does not
    /// exist.
    pub async fn delete(db: &PgPool, id: i32) -> anyhow::Result<Option<Contact>> {
        let contact = sqlx::query_as::<_, Contact>(
            r#"
            DELETE FROM contacts
            WHERE id = $1
            RETURNING id, first_name, last_name, email, phone_number, birthday, additional_info
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(contact)
    }

    /// Case-sensitive substring match on first name OR last name OR email.
    pub async fn search(db: &PgPool, query: &str) -> anyhow::Result<Vec<Contact>> {
        let rows = sqlx::query_as::<_, Contact>(
            r#"
            SELECT id, first_name, last_name, email, phone_number, birthday, additional_info
            FROM contacts
            WHERE first_name LIKE '%' || $1 || '%'
               OR last_name  LIKE '%' || $1 || '%'
               OR email      LIKE '%' || $1 || '%'
            ORDER BY id
            "#,
        )
        .bind(query)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn all(db: &PgPool) -> anyhow::Result<Vec<Contact>> {
        let rows = sqlx::query_as::<_, Contact>(
            r#"
            SELECT id, first_name, last_name, email, phone_number, birthday, additional_info
            FROM contacts
            ORDER BY id
            "#,
        )
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Contacts whose next birthday occurrence falls within the coming week.
    pub async fn upcoming_birthdays(db: &PgPool) -> anyhow::Result<Vec<Contact>> {
        let today = OffsetDateTime::now_utc().date();
        let rows = Self::all(db).await?;
        Ok(rows
            .into_iter()
            .filter(|c| has_upcoming_birthday(c.birthday, today))
            .collect())
    }
}

/// The birthday's occurrence this year, or next year's if it already passed.
/// A month/day that does not exist in a candidate year (Feb 29) falls through
/// to the next candidate; None when neither year has it.
fn upcoming_occurrence(birthday: Date, today: Date) -> Option<Date> {
    match Date::from_calendar_date(today.year(), birthday.month(), birthday.day()) {
        Ok(d) if d >= today => Some(d),
        _ => Date::from_calendar_date(today.year() + 1, birthday.month(), birthday.day()).ok(),
    }
}

/// Inclusive window [today, today + 7 days].
pub(crate) fn has_upcoming_birthday(birthday: Date, today: Date) -> bool {
    match upcoming_occurrence(birthday, today) {
        Some(occurrence) => occurrence <= today + Duration::days(7),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn birthday_within_window_is_included() {
        let today = date!(2024 - 06 - 25);
        assert!(has_upcoming_birthday(date!(1991 - 06 - 28), today));
    }

    #[test]
    fn birthday_today_is_included() {
        let today = date!(2024 - 06 - 25);
        assert!(has_upcoming_birthday(date!(1980 - 06 - 25), today));
    }

    #[test]
    fn birthday_already_passed_is_excluded() {
        let today = date!(2024 - 06 - 25);
        assert!(!has_upcoming_birthday(date!(1991 - 06 - 10), today));
    }

    #[test]
    fn birthday_on_window_edge_is_included() {
        let today = date!(2024 - 06 - 25);
        // 7 days out, crossing into July.
        assert!(has_upcoming_birthday(date!(1975 - 07 - 01), today));
        assert!(has_upcoming_birthday(date!(1975 - 07 - 02), today));
        assert!(!has_upcoming_birthday(date!(1975 - 07 - 03), today));
    }

    #[test]
    fn year_end_birthday_before_rollover_is_included() {
        let today = date!(2024 - 12 - 28);
        assert!(has_upcoming_birthday(date!(1990 - 12 - 31), today));
    }

    #[test]
    fn january_birthday_rolls_over_to_next_year() {
        let today = date!(2024 - 12 - 28);
        assert!(has_upcoming_birthday(date!(1990 - 01 - 02), today));
        assert!(!has_upcoming_birthday(date!(1990 - 01 - 05), today));
    }

    #[test]
    fn leap_day_birthday_resolves_in_leap_years() {
        assert!(has_upcoming_birthday(
            date!(2000 - 02 - 29),
            date!(2024 - 02 - 25)
        ));
        // Next occurrence is Feb 29 of next year, far outside the window.
        assert!(!has_upcoming_birthday(
            date!(2000 - 02 - 29),
            date!(2023 - 02 - 25)
        ));
    }

    #[test]
    fn contact_serializes_birthday_as_iso_date() {
        let contact = Contact {
            id: 1,
            first_name: "Ada".into(),
            last_name: "Smith".into(),
            email: "ada@example.com".into(),
            phone_number: "+1-555-0100".into(),
            birthday: date!(1990 - 06 - 28),
            additional_info: None,
        };
        let json = serde_json::to_string(&contact).unwrap();
        assert!(json.contains("1990-06-28"));
        assert!(json.contains("\"additional_info\":null"));
    }
}
