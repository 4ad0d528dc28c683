use futures::FutureExt;

use crate::config::DbConfig;
use crate::schema;
use crate::serve::db::Pool;

/// Create the local fallback tables in a single transaction.
pub async fn run(db: &DbConfig) -> Result<(), String> {
    let pool = Pool::new(db).map_err(|e| e.to_string())?;
    pool.with_transaction(|tx| {
        async move {
            for statement in schema::statements() {
                tx.batch_execute(statement).await?;
            }
            Ok(())
        }
        .boxed()
    })
    .await
    .map_err(|e| format!("Schema setup failed: {e}"))?;

    println!("Schema ready on {}", db.describe());
    Ok(())
}
