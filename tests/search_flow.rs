//! End-to-end search runs against real SQLite fixtures

use maktaba::coordinator::{
    RunOutcome, SearchCoordinator, SearchEvent, SearchEvents, SearchRequest,
};
use maktaba::normalize::MatchMode;
use maktaba::scanner::{MatchResult, PartitionId};
use maktaba::store::{SourceKind, SqliteLibrary};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

#[derive(Clone, Default)]
struct Recorder {
    events: Arc<Mutex<Vec<SearchEvent>>>,
}

impl Recorder {
    fn events(&self) -> Vec<SearchEvent> {
        self.events.lock().unwrap().clone()
    }

    fn results(&self) -> Vec<MatchResult> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SearchEvent::Batch { results } => Some(results),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

impl SearchEvents for Recorder {
    fn on_initialize(&mut self, partitions_total: usize) {
        self.events
            .lock()
            .unwrap()
            .push(SearchEvent::Initialized { partitions_total });
    }

    fn on_table_progress(&mut self, completed: usize) {
        self.events
            .lock()
            .unwrap()
            .push(SearchEvent::TableProgress { completed });
    }

    fn on_row_progress(&mut self, partition: &PartitionId, current: u64, total: u64) {
        self.events.lock().unwrap().push(SearchEvent::RowProgress {
            partition: partition.clone(),
            current,
            total,
        });
    }

    fn on_batch(&mut self, results: Vec<MatchResult>) {
        self.events
            .lock()
            .unwrap()
            .push(SearchEvent::Batch { results });
    }

    fn on_partition_error(&mut self, partition: &PartitionId, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push(SearchEvent::PartitionError {
                partition: partition.clone(),
                message: message.to_string(),
            });
    }

    fn on_complete(&mut self, outcome: RunOutcome) {
        self.events
            .lock()
            .unwrap()
            .push(SearchEvent::Complete { outcome });
    }
}

fn request(library: &SqliteLibrary, query: &str) -> SearchRequest {
    SearchRequest {
        query: query.to_string(),
        mode: MatchMode::Phrase,
        partitions: library.book_partitions(),
        result_limit: None,
    }
}

/// The canonical scenario: 3 partitions with 10/0/5 rows, query matching
/// rows {2, 7} of the first and row {3} of the third
fn scenario_library() -> (TempDir, Arc<SqliteLibrary>) {
    let dir = TempDir::new().unwrap();
    let mut library = SqliteLibrary::create(dir.path()).unwrap();

    let mut first: Vec<String> = (1..=10).map(|i| format!("سطر عادي رقم {i}")).collect();
    first[1] = "وجاء فيه ذكر النُّور مفصلا".to_string();
    first[6] = "نور على نور يهدي الله".to_string();
    let first_rows: Vec<(&str, i64, i64)> = first
        .iter()
        .enumerate()
        .map(|(i, t)| (t.as_str(), i as i64 + 1, 1))
        .collect();
    library
        .import_source(SourceKind::Book, "كتاب الانوار", "a1.db", "b1", &first_rows)
        .unwrap();

    library
        .import_source(SourceKind::Book, "كتاب فارغ", "a2.db", "b2", &[])
        .unwrap();

    let mut third: Vec<String> = (1..=5).map(|i| format!("كلام اخر {i}")).collect();
    third[2] = "باب في النور والظلمة".to_string();
    let third_rows: Vec<(&str, i64, i64)> = third
        .iter()
        .enumerate()
        .map(|(i, t)| (t.as_str(), i as i64 + 1, 1))
        .collect();
    library
        .import_source(SourceKind::Book, "كتاب ثالث", "a3.db", "b3", &third_rows)
        .unwrap();

    (dir, Arc::new(library))
}

/// A corpus big enough that a run cannot finish before the test pauses or
/// stops it: one match every 100 rows
fn big_library(rows: usize) -> (TempDir, Arc<SqliteLibrary>) {
    let dir = TempDir::new().unwrap();
    let mut library = SqliteLibrary::create(dir.path()).unwrap();
    let filler = "قال رسول الله صلى الله عليه وسلم انما الاعمال بالنيات وانما لكل امرئ ما نوى";
    let texts: Vec<String> = (1..=rows)
        .map(|i| {
            if i % 100 == 0 {
                format!("{filler} مطلوب")
            } else {
                filler.to_string()
            }
        })
        .collect();
    let table_rows: Vec<(&str, i64, i64)> = texts
        .iter()
        .enumerate()
        .map(|(i, t)| (t.as_str(), i as i64 + 1, 1))
        .collect();
    library
        .import_source(SourceKind::Book, "المدونة الكبرى", "big.db", "b1", &table_rows)
        .unwrap();
    (dir, Arc::new(library))
}

#[test]
fn scenario_run_delivers_exact_event_sequence() {
    let (_dir, library) = scenario_library();
    let coordinator = SearchCoordinator::new(library.clone());
    let recorder = Recorder::default();

    coordinator
        .start(request(&library, "نور"), Box::new(recorder.clone()))
        .unwrap();
    coordinator.wait_until_idle();

    let events = recorder.events();
    assert!(matches!(
        events.first(),
        Some(SearchEvent::Initialized { partitions_total: 3 })
    ));
    assert!(matches!(
        events.last(),
        Some(SearchEvent::Complete {
            outcome: RunOutcome::Completed
        })
    ));

    // Row progress per partition: 1..=10 for b1, nothing for b2, 1..=5 for b3
    let progress_for = |table: &str| -> Vec<(u64, u64)> {
        events
            .iter()
            .filter_map(|e| match e {
                SearchEvent::RowProgress {
                    partition,
                    current,
                    total,
                } if partition.table == table => Some((*current, *total)),
                _ => None,
            })
            .collect()
    };
    assert_eq!(
        progress_for("b1"),
        (1..=10).map(|i| (i, 10)).collect::<Vec<_>>()
    );
    assert!(progress_for("b2").is_empty());
    assert_eq!(
        progress_for("b3"),
        (1..=5).map(|i| (i, 5)).collect::<Vec<_>>()
    );

    let table_progress: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            SearchEvent::TableProgress { completed } => Some(*completed),
            _ => None,
        })
        .collect();
    assert_eq!(table_progress, vec![1, 2, 3]);

    // P1: exactly the three expected matches, no duplicates, spans rendered
    let results = recorder.results();
    let mut pairs: Vec<(String, i64)> = results
        .iter()
        .map(|r| (r.partition.table.clone(), r.row_id))
        .collect();
    pairs.sort();
    assert_eq!(
        pairs,
        vec![
            ("b1".to_string(), 2),
            ("b1".to_string(), 7),
            ("b3".to_string(), 3)
        ]
    );
    for result in &results {
        assert!(!result.highlighted.spans.is_empty());
        assert!(!result.title.is_empty());
    }

    // No batch may follow the completion callback
    let complete_index = events
        .iter()
        .position(|e| matches!(e, SearchEvent::Complete { .. }))
        .unwrap();
    assert!(!events[complete_index + 1..]
        .iter()
        .any(|e| matches!(e, SearchEvent::Batch { .. })));
}

#[test]
fn pause_and_resume_match_an_uninterrupted_run() {
    let (_dir, library) = big_library(20_000);

    let coordinator = SearchCoordinator::new(library.clone());
    let baseline = Recorder::default();
    coordinator
        .start(request(&library, "مطلوب"), Box::new(baseline.clone()))
        .unwrap();
    coordinator.wait_until_idle();
    let expected: Vec<i64> = baseline.results().iter().map(|r| r.row_id).collect();
    assert_eq!(expected.len(), 200);

    let interrupted = Recorder::default();
    coordinator
        .start(request(&library, "مطلوب"), Box::new(interrupted.clone()))
        .unwrap();
    std::thread::sleep(Duration::from_millis(20));
    coordinator.pause();
    std::thread::sleep(Duration::from_millis(100));
    coordinator.resume();
    coordinator.wait_until_idle();

    // P2: same result set, same order, nothing lost or duplicated
    let actual: Vec<i64> = interrupted.results().iter().map(|r| r.row_id).collect();
    assert_eq!(actual, expected);
}

#[test]
fn pause_freezes_progress_until_resume() {
    let (_dir, library) = big_library(50_000);
    let coordinator = SearchCoordinator::new(library.clone());
    coordinator
        .start(request(&library, "مطلوب"), Box::new(Recorder::default()))
        .unwrap();

    std::thread::sleep(Duration::from_millis(20));
    coordinator.pause();
    assert!(coordinator.is_paused());
    // Let the worker reach its suspension point, then watch the counters
    std::thread::sleep(Duration::from_millis(30));
    let before = coordinator.progress();
    std::thread::sleep(Duration::from_millis(50));
    let after = coordinator.progress();
    assert_eq!(before, after);

    coordinator.resume();
    coordinator.wait_until_idle();
    let done = coordinator.progress();
    assert_eq!(done.partitions_completed, 1);
}

#[test]
fn stop_while_paused_delivers_no_events_after_complete() {
    let (_dir, library) = big_library(50_000);
    let coordinator = SearchCoordinator::new(library.clone());

    let baseline = Recorder::default();
    coordinator
        .start(request(&library, "مطلوب"), Box::new(baseline.clone()))
        .unwrap();
    coordinator.wait_until_idle();
    let full_run: Vec<i64> = baseline.results().iter().map(|r| r.row_id).collect();

    let recorder = Recorder::default();
    coordinator
        .start(request(&library, "مطلوب"), Box::new(recorder.clone()))
        .unwrap();
    std::thread::sleep(Duration::from_millis(30));
    coordinator.pause();
    coordinator.stop();
    coordinator.wait_until_idle();
    assert!(!coordinator.is_running());

    // P3: the run ends as Stopped, the completion callback is the final
    // event, and everything delivered is a prefix of the full result set
    let events = recorder.events();
    assert!(matches!(
        events.last(),
        Some(SearchEvent::Complete {
            outcome: RunOutcome::Stopped
        })
    ));
    let delivered: Vec<i64> = recorder.results().iter().map(|r| r.row_id).collect();
    assert!(delivered.len() <= full_run.len());
    assert_eq!(delivered.as_slice(), &full_run[..delivered.len()]);
}

#[test]
fn progress_is_monotonic_and_bounded() {
    let (_dir, library) = scenario_library();
    let coordinator = SearchCoordinator::new(library.clone());
    let recorder = Recorder::default();
    coordinator
        .start(request(&library, "نور"), Box::new(recorder.clone()))
        .unwrap();
    coordinator.wait_until_idle();

    // P5: per partition, row counters never decrease and never exceed the
    // total; table progress strictly increases up to the partition count
    let events = recorder.events();
    let mut row_high_water: Option<(PartitionId, u64)> = None;
    for event in &events {
        if let SearchEvent::RowProgress {
            partition,
            current,
            total,
        } = event
        {
            assert!(*current <= *total);
            match &row_high_water {
                Some((last_partition, last)) if last_partition == partition => {
                    assert!(current >= last);
                }
                _ => {}
            }
            row_high_water = Some((partition.clone(), *current));
        }
    }

    let table_progress: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            SearchEvent::TableProgress { completed } => Some(*completed),
            _ => None,
        })
        .collect();
    assert!(table_progress.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(table_progress.last(), Some(&3));
}

#[test]
fn result_limit_ends_the_run_without_stop() {
    let (_dir, library) = big_library(2_500);
    let coordinator = SearchCoordinator::new(library.clone());
    let recorder = Recorder::default();

    let mut req = request(&library, "مطلوب");
    req.result_limit = Some(5);
    coordinator.start(req, Box::new(recorder.clone())).unwrap();
    coordinator.wait_until_idle();

    // P6: 25 matches exist, exactly 5 are delivered, and the run completes
    // on its own
    let results = recorder.results();
    assert_eq!(results.len(), 5);
    let events = recorder.events();
    assert!(matches!(
        events.last(),
        Some(SearchEvent::Complete {
            outcome: RunOutcome::Completed
        })
    ));
}

#[test]
fn duplicate_partitions_are_scanned_once() {
    let (_dir, library) = scenario_library();
    let coordinator = SearchCoordinator::new(library.clone());
    let recorder = Recorder::default();

    let mut req = request(&library, "نور");
    let doubled: Vec<PartitionId> = req
        .partitions
        .iter()
        .chain(req.partitions.iter())
        .cloned()
        .collect();
    req.partitions = doubled;
    coordinator.start(req, Box::new(recorder.clone())).unwrap();
    coordinator.wait_until_idle();

    assert_eq!(recorder.results().len(), 3);
    let events = recorder.events();
    assert!(matches!(
        events.first(),
        Some(SearchEvent::Initialized { partitions_total: 3 })
    ));
}

#[test]
fn book_and_narrator_searches_run_concurrently() {
    let dir = TempDir::new().unwrap();
    let mut library = SqliteLibrary::create(dir.path()).unwrap();
    library
        .import_source(
            SourceKind::Book,
            "كتاب",
            "books.db",
            "b1",
            &[("في العلم نور", 1, 1), ("سطر بلا شيء", 2, 1)],
        )
        .unwrap();
    library
        .import_source(
            SourceKind::Narrators,
            "تراجم الرواة",
            "rijal.db",
            "r1",
            &[("راوي ثقة من اهل النور", 1, 1)],
        )
        .unwrap();
    let library = Arc::new(library);

    let books = SearchCoordinator::new(library.clone());
    let narrators = SearchCoordinator::new(library.clone());

    let book_recorder = Recorder::default();
    let narrator_recorder = Recorder::default();
    books
        .start(
            SearchRequest {
                query: "نور".to_string(),
                mode: MatchMode::Phrase,
                partitions: library.book_partitions(),
                result_limit: None,
            },
            Box::new(book_recorder.clone()),
        )
        .unwrap();
    narrators
        .start(
            SearchRequest {
                query: "نور".to_string(),
                mode: MatchMode::Contains,
                partitions: library.narrator_partitions(),
                result_limit: None,
            },
            Box::new(narrator_recorder.clone()),
        )
        .unwrap();

    books.wait_until_idle();
    narrators.wait_until_idle();

    assert_eq!(book_recorder.results().len(), 1);
    assert_eq!(narrator_recorder.results().len(), 1);
    assert_eq!(book_recorder.results()[0].partition.table, "b1");
    assert_eq!(narrator_recorder.results()[0].partition.table, "r1");
}
