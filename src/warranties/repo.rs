use sqlx::{PgPool, Postgres, QueryBuilder};
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::query::filter::{escape_like, FieldMatch, ListFilter, Page, StatsQuery};
use crate::warranties::dto::{NewWarranty, WarrantyPatch};
use crate::warranties::model::Warranty;

const WARRANTY_COLUMNS: &str = "id, item_name, category, warranty_provider, purchased_on, \
     expires_on, description, added_by, invoice_url, shared_with, created_at";

/// Maps client-facing filter keys to matchable text columns. Anything
/// outside this allow-list is silently dropped; filter keys never reach
/// the SQL text unescaped.
fn column_for(param: &str) -> Option<&'static str> {
    match param {
        "itemName" => Some("item_name"),
        "category" => Some("category"),
        "warrantyProvider" => Some("warranty_provider"),
        "description" => Some("description"),
        _ => None,
    }
}

/// Normalized range bounds come back as RFC 3339 strings; anything the
/// normalizer passed through unparsed is skipped here, matching its
/// no-validation contract.
fn parse_bound(value: &str) -> Option<Date> {
    OffsetDateTime::parse(value, &Rfc3339)
        .ok()
        .map(|dt| dt.date())
}

/// Projection row for stats queries. The SELECT list also carries `id`
/// per the projection contract; extra columns are ignored on decode.
#[derive(Debug, sqlx::FromRow)]
pub struct StatsRow {
    pub category: String,
    pub expires_on: Date,
}

pub async fn create(
    db: &PgPool,
    new: &NewWarranty,
    invoice_url: Option<&str>,
) -> anyhow::Result<Warranty> {
    let warranty = sqlx::query_as::<_, Warranty>(&format!(
        r#"
        INSERT INTO warranties
            (item_name, category, warranty_provider, purchased_on, expires_on,
             description, added_by, invoice_url)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {WARRANTY_COLUMNS}
        "#
    ))
    .bind(&new.item_name)
    .bind(new.category.as_str())
    .bind(&new.warranty_provider)
    .bind(new.purchased_on)
    .bind(new.expires_on)
    .bind(&new.description)
    .bind(new.added_by)
    .bind(invoice_url)
    .fetch_one(db)
    .await?;
    Ok(warranty)
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Warranty>> {
    let warranty = sqlx::query_as::<_, Warranty>(&format!(
        "SELECT {WARRANTY_COLUMNS} FROM warranties WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(warranty)
}

/// Owner listing: shaped filter fields become escaped `ILIKE` clauses
/// (AND semantics), the date range constrains `purchased_on`, and the
/// page applies skip/limit.
pub async fn list_by_user(
    db: &PgPool,
    added_by: Uuid,
    filter: &ListFilter,
    page: Page,
) -> anyhow::Result<Vec<Warranty>> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "SELECT {WARRANTY_COLUMNS} FROM warranties WHERE added_by = "
    ));
    qb.push_bind(added_by);

    for (param, m) in &filter.fields {
        let Some(col) = column_for(param) else {
            continue;
        };
        match m {
            FieldMatch::Contains(value) => {
                qb.push(format!(" AND {col} ILIKE "));
                qb.push_bind(format!("%{}%", escape_like(value)));
            }
        }
    }

    if let Some(start) = filter.date_range.start.as_deref().and_then(parse_bound) {
        qb.push(" AND purchased_on >= ");
        qb.push_bind(start);
    }
    if let Some(end) = filter.date_range.end.as_deref().and_then(parse_bound) {
        qb.push(" AND purchased_on <= ");
        qb.push_bind(end);
    }

    qb.push(" ORDER BY expires_on ASC LIMIT ");
    qb.push_bind(page.limit);
    qb.push(" OFFSET ");
    qb.push_bind(page.skip);

    let rows = qb.build_query_as::<Warranty>().fetch_all(db).await?;
    Ok(rows)
}

pub async fn update(
    db: &PgPool,
    id: Uuid,
    patch: &WarrantyPatch,
    invoice_url: Option<&str>,
) -> anyhow::Result<Option<Warranty>> {
    let warranty = sqlx::query_as::<_, Warranty>(&format!(
        r#"
        UPDATE warranties SET
            item_name = COALESCE($2, item_name),
            category = COALESCE($3, category),
            warranty_provider = COALESCE($4, warranty_provider),
            purchased_on = COALESCE($5, purchased_on),
            expires_on = COALESCE($6, expires_on),
            description = COALESCE($7, description),
            invoice_url = COALESCE($8, invoice_url)
        WHERE id = $1
        RETURNING {WARRANTY_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&patch.item_name)
    .bind(patch.category.map(|c| c.as_str()))
    .bind(&patch.warranty_provider)
    .bind(patch.purchased_on)
    .bind(patch.expires_on)
    .bind(&patch.description)
    .bind(invoice_url)
    .fetch_optional(db)
    .await?;
    Ok(warranty)
}

pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Warranty>> {
    let warranty = sqlx::query_as::<_, Warranty>(&format!(
        "DELETE FROM warranties WHERE id = $1 RETURNING {WARRANTY_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(warranty)
}

/// Warranties still active but expiring within `within_days` of `today`.
pub async fn list_expiring(
    db: &PgPool,
    added_by: Uuid,
    today: Date,
    within_days: i64,
) -> anyhow::Result<Vec<Warranty>> {
    let cutoff = today + time::Duration::days(within_days);
    let rows = sqlx::query_as::<_, Warranty>(&format!(
        r#"
        SELECT {WARRANTY_COLUMNS} FROM warranties
        WHERE added_by = $1 AND expires_on >= $2 AND expires_on <= $3
        ORDER BY expires_on ASC
        "#
    ))
    .bind(added_by)
    .bind(today)
    .bind(cutoff)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn set_shared_with(
    db: &PgPool,
    id: Uuid,
    shared_with: &[String],
) -> anyhow::Result<()> {
    sqlx::query("UPDATE warranties SET shared_with = $2 WHERE id = $1")
        .bind(id)
        .bind(shared_with)
        .execute(db)
        .await?;
    Ok(())
}

/// Renders the shaped stats query: exact-match stage as `=` clauses over
/// allow-listed columns, projection stage as the restricted SELECT list.
pub async fn stats_rows(
    db: &PgPool,
    added_by: Uuid,
    stats: &StatsQuery,
) -> anyhow::Result<Vec<StatsRow>> {
    // The row type needs all three projected columns regardless of what
    // the client matched on, so the SELECT list is the projection base.
    let mut qb: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT id, category, expires_on FROM warranties WHERE added_by = ");
    qb.push_bind(added_by);

    for (param, value) in &stats.matches {
        let Some(col) = column_for(param) else {
            continue;
        };
        qb.push(format!(" AND {col} = "));
        qb.push_bind(value.clone());
    }

    let rows = qb.build_query_as::<StatsRow>().fetch_all(db).await?;
    Ok(rows)
}
