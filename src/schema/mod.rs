use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement};
use sea_orm_migration::prelude::*;

mod accounts;
mod one_time_tokens;
mod refresh_tokens;
mod social_accounts;

pub async fn apply(conn: &DatabaseConnection) -> Result<(), DbErr> {
    let manager = SchemaManager::new(conn);

    conn.execute(Statement::from_string(
        DbBackend::Postgres,
        "CREATE EXTENSION IF NOT EXISTS pgcrypto".to_string(),
    ))
    .await?;

    accounts::apply(&manager, conn).await?;
    social_accounts::apply(&manager, conn).await?;
    refresh_tokens::apply(&manager, conn).await?;
    one_time_tokens::apply(&manager, conn).await?;
    apply_audit_invariants(conn).await?;

    Ok(())
}

async fn apply_audit_invariants(conn: &DatabaseConnection) -> Result<(), DbErr> {
    conn.execute(Statement::from_string(
        DbBackend::Postgres,
        r#"
CREATE OR REPLACE FUNCTION set_updated_at()
RETURNS trigger AS $$
BEGIN
  NEW.updated_at = now();
  RETURN NEW;
END;
$$ LANGUAGE plpgsql;
"#
        .to_string(),
    ))
    .await?;

    for table in ["accounts", "social_accounts", "refresh_tokens"] {
        let trigger_name = format!("trg_{}_set_updated_at", table);
        conn.execute(Statement::from_string(
            DbBackend::Postgres,
            format!(
                r#"
DO $$
BEGIN
  IF NOT EXISTS (
    SELECT 1
    FROM pg_trigger
    WHERE tgname = '{trigger_name}'
      AND tgrelid = '{table}'::regclass
  ) THEN
    EXECUTE 'CREATE TRIGGER {trigger_name}
             BEFORE UPDATE ON {table}
             FOR EACH ROW
             EXECUTE FUNCTION set_updated_at()';
  END IF;
END $$;
"#
            ),
        ))
        .await?;
    }

    // A soft-deleted row must carry its deletion timestamp and vice versa.
    conn.execute(Statement::from_string(
        DbBackend::Postgres,
        r#"
DO $$
BEGIN
  IF NOT EXISTS (
    SELECT 1
    FROM pg_constraint
    WHERE conname = 'accounts_deleted_pair_check'
      AND conrelid = 'accounts'::regclass
  ) THEN
    EXECUTE 'ALTER TABLE accounts
             ADD CONSTRAINT accounts_deleted_pair_check
             CHECK (is_deleted = (deleted_at IS NOT NULL))';
  END IF;
END $$;
"#
        .to_string(),
    ))
    .await?;

    Ok(())
}
