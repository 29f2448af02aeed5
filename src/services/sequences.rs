use sea_orm::{
    sea_query::{Expr, OnConflict},
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};
use tracing::{debug, warn};

use crate::{
    entities::document_sequence::{self, Entity as DocumentSequence},
    errors::ServiceError,
};

const MAX_ATTEMPTS: usize = 8;

/// Human-facing document number series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
pub enum DocumentPrefix {
    #[strum(serialize = "ORD")]
    Order,
    #[strum(serialize = "PR")]
    PurchaseRequest,
    #[strum(serialize = "DN")]
    DispatchNote,
    #[strum(serialize = "RCPT")]
    PaymentReceipt,
    #[strum(serialize = "SR")]
    SellRecord,
}

pub fn format_document_number(prefix: DocumentPrefix, value: i64) -> String {
    format!("{}{:06}", prefix, value)
}

/// Hands out the next number in a series (`ORD000001`, `PR000042`, ...).
///
/// Runs on the caller's connection so the number is only consumed if the
/// surrounding transaction commits. The counter row is advanced with a
/// version compare-and-swap; two writers never observe the same value.
pub async fn next_document_number<C>(
    conn: &C,
    prefix: DocumentPrefix,
) -> Result<String, ServiceError>
where
    C: ConnectionTrait,
{
    let key = prefix.as_ref().to_string();

    for attempt in 0..MAX_ATTEMPTS {
        let current = DocumentSequence::find_by_id(key.clone()).one(conn).await?;

        match current {
            None => {
                let first = document_sequence::ActiveModel {
                    prefix: Set(key.clone()),
                    last_value: Set(1),
                    version: Set(1),
                };
                let inserted = DocumentSequence::insert(first)
                    .on_conflict(
                        OnConflict::column(document_sequence::Column::Prefix)
                            .do_nothing()
                            .to_owned(),
                    )
                    .exec_without_returning(conn)
                    .await?;
                if inserted == 1 {
                    return Ok(format_document_number(prefix, 1));
                }
            }
            Some(seq) => {
                let next = seq.last_value + 1;
                let result = DocumentSequence::update_many()
                    .col_expr(document_sequence::Column::LastValue, Expr::value(next))
                    .col_expr(
                        document_sequence::Column::Version,
                        Expr::value(seq.version + 1),
                    )
                    .filter(document_sequence::Column::Prefix.eq(key.as_str()))
                    .filter(document_sequence::Column::Version.eq(seq.version))
                    .exec(conn)
                    .await?;
                if result.rows_affected == 1 {
                    debug!(prefix = %prefix, value = next, "allocated document number");
                    return Ok(format_document_number(prefix, next));
                }
            }
        }

        warn!(prefix = %prefix, attempt, "document sequence contention, retrying");
    }

    Err(ServiceError::Conflict(format!(
        "could not allocate a {} number",
        prefix
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_are_zero_padded_to_six_digits() {
        assert_eq!(format_document_number(DocumentPrefix::Order, 1), "ORD000001");
        assert_eq!(
            format_document_number(DocumentPrefix::PaymentReceipt, 4321),
            "RCPT004321"
        );
        assert_eq!(
            format_document_number(DocumentPrefix::DispatchNote, 1_234_567),
            "DN1234567"
        );
    }
}
