use laneboard_core::db::open_db_in_memory;
use laneboard_core::{
    AccessPolicy, BearerCredential, BoardGateway, BoardId, BoardService, ColumnDraft, ServiceError,
    SqliteBoardRepository, StructuralOp, TaskDraft,
};
use std::sync::Arc;
use uuid::Uuid;

fn credential() -> BearerCredential {
    BearerCredential::new("test-token")
}

#[test]
fn create_board_normalizes_title_and_description() {
    let conn = open_db_in_memory().unwrap();
    let service = BoardService::new(SqliteBoardRepository::try_new(&conn).unwrap());

    let board = service
        .create_board(&credential(), "  Roadmap  ", Some("   ".to_string()))
        .unwrap();
    assert_eq!(board.title, "Roadmap");
    assert_eq!(board.description, None);
    assert!(board.column_order.is_empty());

    let snapshot = service.get_board(board.uuid).unwrap();
    assert_eq!(snapshot.board.title, "Roadmap");
    assert!(snapshot.columns.is_empty());
}

#[test]
fn blank_board_title_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let service = BoardService::new(SqliteBoardRepository::try_new(&conn).unwrap());

    let err = service
        .create_board(&credential(), "   ", None)
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTitle));
    assert!(service.list_boards().unwrap().is_empty());
}

#[test]
fn list_boards_reports_counts_in_creation_order() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteBoardRepository::try_new(&conn).unwrap();
    let service = BoardService::new(SqliteBoardRepository::try_new(&conn).unwrap());

    let first = service.create_board(&credential(), "First", None).unwrap();
    let second = service
        .create_board(&credential(), "Second", Some("later board".to_string()))
        .unwrap();

    // created_at has second precision; force distinct values so the listing
    // order is deterministic.
    conn.execute(
        "UPDATE boards SET created_at = 1000 WHERE board_uuid = ?1;",
        [first.uuid.to_string()],
    )
    .unwrap();
    conn.execute(
        "UPDATE boards SET created_at = 2000 WHERE board_uuid = ?1;",
        [second.uuid.to_string()],
    )
    .unwrap();

    let column = ColumnDraft::new("Todo");
    repo.apply(
        &credential(),
        first.uuid,
        &StructuralOp::InsertColumn {
            draft: column.clone(),
            at_index: None,
        },
    )
    .unwrap();
    for title in ["a", "b"] {
        repo.apply(
            &credential(),
            first.uuid,
            &StructuralOp::InsertTask {
                column_uuid: column.uuid,
                draft: TaskDraft::new(title),
                at_index: None,
            },
        )
        .unwrap();
    }

    let boards = service.list_boards().unwrap();
    assert_eq!(boards.len(), 2);
    assert_eq!(boards[0].board_uuid, first.uuid);
    assert_eq!(boards[0].title, "First");
    assert_eq!(boards[0].column_count, 1);
    assert_eq!(boards[0].task_count, 2);
    assert_eq!(boards[1].board_uuid, second.uuid);
    assert_eq!(boards[1].description.as_deref(), Some("later board"));
    assert_eq!(boards[1].column_count, 0);
    assert_eq!(boards[1].task_count, 0);
}

#[test]
fn get_board_for_unknown_id_reports_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = BoardService::new(SqliteBoardRepository::try_new(&conn).unwrap());
    let ghost = Uuid::new_v4();

    let err = service.get_board(ghost).unwrap_err();
    assert!(matches!(err, ServiceError::BoardNotFound(id) if id == ghost));
}

#[test]
fn delete_board_cascades_columns_and_tasks() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteBoardRepository::try_new(&conn).unwrap();
    let service = BoardService::new(SqliteBoardRepository::try_new(&conn).unwrap());

    let board = service.create_board(&credential(), "Doomed", None).unwrap();
    let column = ColumnDraft::new("Todo");
    repo.apply(
        &credential(),
        board.uuid,
        &StructuralOp::InsertColumn {
            draft: column.clone(),
            at_index: None,
        },
    )
    .unwrap();
    repo.apply(
        &credential(),
        board.uuid,
        &StructuralOp::InsertTask {
            column_uuid: column.uuid,
            draft: TaskDraft::new("going away"),
            at_index: None,
        },
    )
    .unwrap();

    service.delete_board(&credential(), board.uuid).unwrap();

    let remaining: i64 = conn
        .query_row(
            "SELECT (SELECT COUNT(*) FROM boards)
                  + (SELECT COUNT(*) FROM columns)
                  + (SELECT COUNT(*) FROM tasks);",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(remaining, 0);

    let err = service
        .delete_board(&credential(), board.uuid)
        .unwrap_err();
    assert!(matches!(err, ServiceError::BoardNotFound(id) if id == board.uuid));
}

struct DenyAll;

impl AccessPolicy for DenyAll {
    fn allow_mutation(&self, _credential: &BearerCredential, _board_uuid: BoardId) -> bool {
        false
    }
}

#[test]
fn denied_credential_cannot_create_or_delete() {
    let conn = open_db_in_memory().unwrap();
    let open_service = BoardService::new(SqliteBoardRepository::try_new(&conn).unwrap());
    let board = open_service
        .create_board(&credential(), "Guarded", None)
        .unwrap();

    let service = BoardService::new(
        SqliteBoardRepository::with_policy(&conn, Arc::new(DenyAll)).unwrap(),
    );

    let err = service
        .create_board(&credential(), "Blocked", None)
        .unwrap_err();
    assert!(matches!(err, ServiceError::Denied(_)));

    let err = service
        .delete_board(&credential(), board.uuid)
        .unwrap_err();
    assert!(matches!(err, ServiceError::Denied(id) if id == board.uuid));

    // Reads are unauthenticated and keep working.
    assert_eq!(service.list_boards().unwrap().len(), 1);
    assert!(service.get_board(board.uuid).is_ok());
}
