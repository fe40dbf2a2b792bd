use partiql_middleware::prelude::*;

#[test]
fn every_supported_shape_classifies() {
    let cases: [(&str, StatementKind, Option<&str>, &[&str]); 8] = [
        (
            r#"SELECT id, name FROM "users" WHERE id = ?"#,
            StatementKind::Select,
            Some("users"),
            &["id", "name"],
        ),
        (r#"SELECT * FROM "users""#, StatementKind::Select, Some("users"), &[]),
        (
            r#"INSERT INTO "users" VALUE {'id': ?, 'name': ?}"#,
            StatementKind::Insert,
            Some("users"),
            &[],
        ),
        (
            r#"UPDATE "users" SET name = ? WHERE id = ?"#,
            StatementKind::Update,
            Some("users"),
            &[],
        ),
        (
            r#"DELETE FROM "users" WHERE id = ?"#,
            StatementKind::Delete,
            Some("users"),
            &[],
        ),
        (
            r#"DELETE FROM "users" WHERE id = ? RETURNING ALL OLD *"#,
            StatementKind::Delete,
            Some("users"),
            &[],
        ),
        (
            r#"SELECT * FROM "!pqxd_describe_table" WHERE table_name = ?"#,
            StatementKind::DescribeTable,
            None,
            &[],
        ),
        (
            r#"SELECT * FROM "!pqxd_list_tables""#,
            StatementKind::ListTables,
            None,
            &[],
        ),
    ];

    for (sql, kind, table, columns) in cases {
        let parsed = classify(sql).unwrap_or_else(|e| panic!("{sql}: {e}"));
        assert_eq!(parsed.kind(), kind, "{sql}");
        assert_eq!(parsed.table_name(), table, "{sql}");
        assert_eq!(parsed.selected_columns(), columns, "{sql}");
    }
}

#[test]
fn unsupported_text_is_rejected() {
    for sql in [
        "",
        "DROP TABLE users",
        r#"SELECT id FROM "users" ORDER BY id"#,
        r#"INSERT INTO "users" VALUES (1, 2)"#,
        r#"UPDATE "users" SET a = 1"#,
        r#"DELETE FROM "users""#,
        r#"UPDATE "users" SET a = 1 WHERE id = 1 RETURNING ALL EVERYTHING"#,
    ] {
        assert!(
            matches!(classify(sql), Err(PartiqlDbError::InvalidStatement(_))),
            "{sql} should be rejected"
        );
    }
}

#[test]
fn placeholders_inside_literals_are_not_counted() {
    let parsed = classify(r#"SELECT * FROM "users" WHERE note = 'why?' AND id = ?"#).unwrap();
    assert_eq!(parsed.placeholder_count(), 1);

    let parsed =
        classify(r#"INSERT INTO "users" VALUE {'id': ?, 'q': 'a ? b', 'tags': [?, '?']}"#).unwrap();
    assert_eq!(parsed.placeholder_count(), 2);

    let parsed =
        classify(r#"UPDATE "users" SET note = '?' SET n = ? WHERE id = ? AND s <> '??'"#).unwrap();
    assert_eq!(parsed.placeholder_count(), 2);
}

#[test]
fn quoted_and_bare_column_lists_are_equivalent() {
    let quoted = classify(r#"SELECT "id","name" FROM "t_1""#).unwrap();
    let bare = classify(r#"SELECT id, name FROM "t_1""#).unwrap();
    assert_eq!(quoted.selected_columns(), ["id", "name"]);
    assert_eq!(quoted.selected_columns(), bare.selected_columns());
}

#[test]
fn update_returning_rewrites_projection() {
    let parsed =
        classify(r#"UPDATE "users" SET name = ? WHERE id = ? RETURNING ALL OLD id, name"#).unwrap();
    assert_eq!(parsed.kind(), StatementKind::Update);
    assert_eq!(parsed.selected_columns(), ["id", "name"]);
    assert_eq!(parsed.placeholder_count(), 2);
    assert_eq!(
        parsed.returning(),
        Some(Returning {
            scope: ReturningScope::All,
            image: ReturningImage::Old,
        })
    );
    assert!(parsed.returns_rows());
    assert_eq!(
        parsed.rewritten_text(),
        r#"UPDATE "users" SET name = ? WHERE id = ? RETURNING ALL OLD *"#
    );
}

#[test]
fn returning_keyword_inside_a_literal_is_ignored() {
    let parsed =
        classify(r#"DELETE FROM "users" WHERE note = 'RETURNING ALL OLD x' AND id = ?"#).unwrap();
    assert!(parsed.returning().is_none());
    assert!(!parsed.returns_rows());
    assert_eq!(parsed.placeholder_count(), 1);
}

#[test]
fn select_against_an_index() {
    let parsed = classify(r#"SELECT * FROM "orders"."by-customer" WHERE customer = ?"#).unwrap();
    assert_eq!(parsed.table_name(), Some("orders"));
    assert_eq!(parsed.index_name(), Some("by-customer"));
}
