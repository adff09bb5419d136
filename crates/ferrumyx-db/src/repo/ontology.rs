//! Queries for `ontology_terms` / `ontology_term_relations`.
//!
//! Hierarchy traversal never follows an in-memory object graph — every hop
//! is its own bounded query, capped at one hop unless the caller asks for
//! recursive closure (§9 cyclic-structure note).

use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::{OntologyTerm, OntologyTermRelation};

#[derive(Debug, Clone)]
pub struct NewOntologyTerm {
    pub term_id: String,
    pub name: String,
    pub definition: Option<String>,
    pub synonyms: Vec<String>,
    pub xrefs: Vec<String>,
    pub term_metadata: Value,
}

#[derive(Debug, Clone)]
pub struct NewOntologyRelation {
    pub child_term_id: String,
    pub parent_term_id: String,
    pub relation_type: String,
}

/// Runs against the caller's transaction so the delete, the reinsert, and
/// the first status write commit or roll back together.
pub async fn delete_scope<'a>(
    tx: &mut Transaction<'a, Postgres>,
    ontology_type: &str,
    source_id: &str,
) -> Result<(u64, u64), sqlx::Error> {
    let relations = sqlx::query(
        "DELETE FROM ontology_term_relations WHERE ontology_type = $1 AND source_id = $2",
    )
    .bind(ontology_type)
    .bind(source_id)
    .execute(&mut **tx)
    .await?
    .rows_affected();
    let terms = sqlx::query("DELETE FROM ontology_terms WHERE ontology_type = $1 AND source_id = $2")
        .bind(ontology_type)
        .bind(source_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();
    Ok((terms, relations))
}

pub async fn insert_terms<'a>(
    tx: &mut Transaction<'a, Postgres>,
    ontology_type: &str,
    source_id: &str,
    terms: &[NewOntologyTerm],
) -> Result<u64, sqlx::Error> {
    for t in terms {
        sqlx::query(
            "INSERT INTO ontology_terms (ontology_type, source_id, term_id, name, definition, synonyms, xrefs, term_metadata)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (ontology_type, source_id, term_id) DO UPDATE
             SET name = EXCLUDED.name, definition = EXCLUDED.definition,
                 synonyms = EXCLUDED.synonyms, xrefs = EXCLUDED.xrefs, term_metadata = EXCLUDED.term_metadata",
        )
        .bind(ontology_type)
        .bind(source_id)
        .bind(&t.term_id)
        .bind(&t.name)
        .bind(&t.definition)
        .bind(serde_json::to_value(&t.synonyms).unwrap())
        .bind(serde_json::to_value(&t.xrefs).unwrap())
        .bind(&t.term_metadata)
        .execute(&mut **tx)
        .await?;
    }
    Ok(terms.len() as u64)
}

pub async fn insert_relations<'a>(
    tx: &mut Transaction<'a, Postgres>,
    ontology_type: &str,
    source_id: &str,
    relations: &[NewOntologyRelation],
) -> Result<u64, sqlx::Error> {
    for r in relations {
        if r.child_term_id == r.parent_term_id {
            continue; // no self-edges
        }
        sqlx::query(
            "INSERT INTO ontology_term_relations (ontology_type, source_id, child_term_id, parent_term_id, relation_type)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT DO NOTHING",
        )
        .bind(ontology_type)
        .bind(source_id)
        .bind(&r.child_term_id)
        .bind(&r.parent_term_id)
        .bind(&r.relation_type)
        .execute(&mut **tx)
        .await?;
    }
    Ok(relations.len() as u64)
}

pub async fn parents_of(
    pool: &PgPool,
    ontology_type: &str,
    source_id: &str,
    term_id: &str,
) -> Result<Vec<OntologyTermRelation>, sqlx::Error> {
    sqlx::query_as::<_, OntologyTermRelation>(
        "SELECT ontology_type, source_id, child_term_id, parent_term_id, relation_type
         FROM ontology_term_relations
         WHERE ontology_type = $1 AND source_id = $2 AND child_term_id = $3",
    )
    .bind(ontology_type)
    .bind(source_id)
    .bind(term_id)
    .fetch_all(pool)
    .await
}

pub async fn children_of(
    pool: &PgPool,
    ontology_type: &str,
    source_id: &str,
    term_id: &str,
) -> Result<Vec<OntologyTermRelation>, sqlx::Error> {
    sqlx::query_as::<_, OntologyTermRelation>(
        "SELECT ontology_type, source_id, child_term_id, parent_term_id, relation_type
         FROM ontology_term_relations
         WHERE ontology_type = $1 AND source_id = $2 AND parent_term_id = $3",
    )
    .bind(ontology_type)
    .bind(source_id)
    .bind(term_id)
    .fetch_all(pool)
    .await
}

pub async fn count_terms(
    pool: &PgPool,
    ontology_type: &str,
    source_id: &str,
) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        "SELECT count(*) FROM ontology_terms WHERE ontology_type = $1 AND source_id = $2",
    )
    .bind(ontology_type)
    .bind(source_id)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

pub async fn get_term(
    pool: &PgPool,
    ontology_type: &str,
    source_id: &str,
    term_id: &str,
) -> Result<Option<OntologyTerm>, sqlx::Error> {
    sqlx::query_as::<_, OntologyTerm>(
        "SELECT ontology_type, source_id, term_id, name, definition, synonyms, xrefs, term_metadata
         FROM ontology_terms WHERE ontology_type = $1 AND source_id = $2 AND term_id = $3",
    )
    .bind(ontology_type)
    .bind(source_id)
    .bind(term_id)
    .fetch_optional(pool)
    .await
}
