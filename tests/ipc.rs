/*!
 * IPC subsystem tests entry point
 */

#[path = "ipc/shm_test.rs"]
mod shm_test;

#[path = "ipc/sem_test.rs"]
mod sem_test;

#[path = "ipc/queue_test.rs"]
mod queue_test;

#[path = "ipc/jobs_test.rs"]
mod jobs_test;

#[path = "ipc/cleanup_test.rs"]
mod cleanup_test;
