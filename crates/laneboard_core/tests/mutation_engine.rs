use laneboard_core::engine::mutation::{
    delete_column, delete_task, insert_column, insert_task, move_column, move_task,
    update_task_fields, MutationError,
};
use laneboard_core::model::ordering::{check_snapshot, is_contiguous};
use laneboard_core::{
    apply_op, Board, BoardSnapshot, ColumnDraft, ColumnId, StructuralOp, TaskDraft, TaskId,
    ValidationError,
};
use uuid::Uuid;

struct Fixture {
    snapshot: BoardSnapshot,
    todo: ColumnId,
    doing: ColumnId,
    todo_tasks: Vec<TaskId>,
    doing_tasks: Vec<TaskId>,
}

/// Builds `Todo: [T1, T2, T3]` and `Doing: [U1]` through the engine itself.
fn fixture() -> Fixture {
    let mut snapshot = BoardSnapshot::new(Board::new("Sprint", None));

    let todo_draft = ColumnDraft::new("Todo");
    let doing_draft = ColumnDraft::new("Doing");
    snapshot = insert_column(&snapshot, &todo_draft, None).unwrap();
    snapshot = insert_column(&snapshot, &doing_draft, None).unwrap();

    let mut todo_tasks = Vec::new();
    for title in ["T1", "T2", "T3"] {
        let draft = TaskDraft::new(title);
        todo_tasks.push(draft.uuid);
        snapshot = insert_task(&snapshot, todo_draft.uuid, &draft, None).unwrap();
    }
    let u1 = TaskDraft::new("U1");
    let doing_tasks = vec![u1.uuid];
    snapshot = insert_task(&snapshot, doing_draft.uuid, &u1, None).unwrap();

    Fixture {
        snapshot,
        todo: todo_draft.uuid,
        doing: doing_draft.uuid,
        todo_tasks,
        doing_tasks,
    }
}

fn task_order(snapshot: &BoardSnapshot, column: ColumnId) -> Vec<TaskId> {
    snapshot
        .ordered_tasks(column)
        .iter()
        .map(|task| task.uuid)
        .collect()
}

#[test]
fn same_column_move_removes_before_clamping() {
    let f = fixture();
    let [t1, t2, t3] = [f.todo_tasks[0], f.todo_tasks[1], f.todo_tasks[2]];

    // Index 2 addresses the list after T1 is taken out, so T1 lands last.
    let moved = move_task(&f.snapshot, t1, f.todo, 2).unwrap();
    assert_eq!(task_order(&moved, f.todo), vec![t2, t3, t1]);
    assert!(is_contiguous(
        moved.ordered_tasks(f.todo).iter().map(|task| task.sort_order)
    ));
    check_snapshot(&moved).unwrap();
}

#[test]
fn cross_column_move_renumbers_both_columns() {
    let f = fixture();
    let [t1, t2, t3] = [f.todo_tasks[0], f.todo_tasks[1], f.todo_tasks[2]];
    let u1 = f.doing_tasks[0];

    let moved = move_task(&f.snapshot, t2, f.doing, 0).unwrap();
    assert_eq!(task_order(&moved, f.todo), vec![t1, t3]);
    assert_eq!(task_order(&moved, f.doing), vec![t2, u1]);
    assert_eq!(moved.task(t2).unwrap().column_uuid, f.doing);
    assert_eq!(moved.task(t3).unwrap().sort_order, 1);
    assert_eq!(moved.task(u1).unwrap().sort_order, 1);
    check_snapshot(&moved).unwrap();
}

#[test]
fn out_of_range_target_index_clamps_to_end() {
    let f = fixture();
    let t1 = f.todo_tasks[0];

    let moved = move_task(&f.snapshot, t1, f.doing, 99).unwrap();
    assert_eq!(task_order(&moved, f.doing), vec![f.doing_tasks[0], t1]);

    let column = ColumnDraft::new("Review");
    let inserted = insert_column(&f.snapshot, &column, Some(57)).unwrap();
    assert_eq!(
        inserted.board.column_order,
        vec![f.todo, f.doing, column.uuid]
    );
    check_snapshot(&inserted).unwrap();
}

#[test]
fn move_to_current_position_is_structurally_equal() {
    let f = fixture();
    let t2 = f.todo_tasks[1];

    let unchanged = move_task(&f.snapshot, t2, f.todo, 1).unwrap();
    assert_eq!(unchanged, f.snapshot);

    let unchanged = move_column(&f.snapshot, f.todo, 0).unwrap();
    assert_eq!(unchanged, f.snapshot);
}

#[test]
fn insert_into_empty_column_starts_at_zero() {
    let mut snapshot = BoardSnapshot::new(Board::new("Empty", None));
    let column = ColumnDraft::new("Todo");
    snapshot = insert_column(&snapshot, &column, None).unwrap();

    let draft = TaskDraft::new("first task");
    let inserted = insert_task(&snapshot, column.uuid, &draft, Some(0)).unwrap();
    assert_eq!(inserted.task(draft.uuid).unwrap().sort_order, 0);
    assert_eq!(task_order(&inserted, column.uuid), vec![draft.uuid]);
}

#[test]
fn insert_at_index_shifts_later_siblings() {
    let f = fixture();
    let draft = TaskDraft::new("wedge");

    let inserted = insert_task(&f.snapshot, f.todo, &draft, Some(1)).unwrap();
    assert_eq!(
        task_order(&inserted, f.todo),
        vec![f.todo_tasks[0], draft.uuid, f.todo_tasks[1], f.todo_tasks[2]]
    );
    assert!(is_contiguous(
        inserted
            .ordered_tasks(f.todo)
            .iter()
            .map(|task| task.sort_order)
    ));
}

#[test]
fn missing_entities_fail_without_touching_the_input() {
    let f = fixture();
    let ghost = Uuid::new_v4();

    let err = move_task(&f.snapshot, ghost, f.todo, 0).unwrap_err();
    assert_eq!(err, MutationError::TaskNotFound(ghost));

    let err = move_task(&f.snapshot, f.todo_tasks[0], ghost, 0).unwrap_err();
    assert_eq!(err, MutationError::ColumnNotFound(ghost));

    let err = delete_column(&f.snapshot, ghost).unwrap_err();
    assert_eq!(err, MutationError::ColumnNotFound(ghost));

    // The input snapshot is untouched and still consistent.
    check_snapshot(&f.snapshot).unwrap();
    assert_eq!(task_order(&f.snapshot, f.todo), f.todo_tasks);
}

#[test]
fn duplicate_draft_id_is_rejected() {
    let f = fixture();
    let mut draft = TaskDraft::new("double");
    draft.uuid = f.todo_tasks[0];

    let err = insert_task(&f.snapshot, f.todo, &draft, None).unwrap_err();
    assert_eq!(err, MutationError::DuplicateId(f.todo_tasks[0]));
}

#[test]
fn delete_column_cascades_its_tasks() {
    let f = fixture();

    let deleted = delete_column(&f.snapshot, f.todo).unwrap();
    assert!(deleted.column(f.todo).is_none());
    for task_uuid in &f.todo_tasks {
        assert!(deleted.task(*task_uuid).is_none());
    }
    assert_eq!(deleted.board.column_order, vec![f.doing]);
    assert_eq!(deleted.column(f.doing).unwrap().sort_order, 0);
    check_snapshot(&deleted).unwrap();
}

#[test]
fn delete_task_closes_the_gap() {
    let f = fixture();

    let deleted = delete_task(&f.snapshot, f.todo_tasks[1]).unwrap();
    assert_eq!(
        task_order(&deleted, f.todo),
        vec![f.todo_tasks[0], f.todo_tasks[2]]
    );
    assert_eq!(deleted.task(f.todo_tasks[2]).unwrap().sort_order, 1);
}

#[test]
fn update_task_fields_validates_before_applying() {
    let f = fixture();
    let t1 = f.todo_tasks[0];

    let mut fields = f.snapshot.task(t1).unwrap().fields();
    fields.title = "  ".to_string();
    let err = update_task_fields(&f.snapshot, t1, &fields).unwrap_err();
    assert_eq!(err, MutationError::Validation(ValidationError::BlankTitle));

    fields.title = "Renamed".to_string();
    fields.labels.insert("urgent".to_string());
    let updated = update_task_fields(&f.snapshot, t1, &fields).unwrap();
    assert_eq!(updated.task(t1).unwrap().title, "Renamed");
    assert!(updated.task(t1).unwrap().labels.contains("urgent"));
    assert_eq!(updated.task(t1).unwrap().sort_order, 0);
}

#[test]
fn mixed_operation_sequence_keeps_every_order_contiguous() {
    let f = fixture();
    let review = ColumnDraft::new("Review");
    let extra = TaskDraft::new("extra");

    let ops = [
        StructuralOp::InsertColumn {
            draft: review.clone(),
            at_index: Some(1),
        },
        StructuralOp::MoveTask {
            task_uuid: f.todo_tasks[0],
            to_column_uuid: review.uuid,
            to_index: 0,
        },
        StructuralOp::InsertTask {
            column_uuid: review.uuid,
            draft: extra.clone(),
            at_index: Some(0),
        },
        StructuralOp::MoveColumn {
            column_uuid: review.uuid,
            to_index: 5,
        },
        StructuralOp::DeleteTask {
            task_uuid: f.todo_tasks[1],
        },
        StructuralOp::MoveTask {
            task_uuid: extra.uuid,
            to_column_uuid: f.doing,
            to_index: 1,
        },
    ];

    let mut snapshot = f.snapshot;
    for op in &ops {
        snapshot = apply_op(&snapshot, op).unwrap();
        check_snapshot(&snapshot).unwrap();
    }

    assert_eq!(snapshot.board.column_order.len(), 3);
    assert_eq!(task_order(&snapshot, f.todo), vec![f.todo_tasks[2]]);
    assert_eq!(
        task_order(&snapshot, f.doing),
        vec![f.doing_tasks[0], extra.uuid]
    );
    assert_eq!(task_order(&snapshot, review.uuid), vec![f.todo_tasks[0]]);
}
