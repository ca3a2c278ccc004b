use std::ptr;

use opencl3::event::{
    create_user_event, release_event, retain_event, set_user_event_status, wait_for_events,
};
use opencl3::types::{cl_event, cl_int, cl_uint};

use crate::error::{Error, NativeResultExt, Result};
use crate::runtime::context::Context;

/// Terminal or intermediate state of a command, as set on user events.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ExecutionStatus {
    Complete,
    Running,
    Submitted,
    Queued,
    /// Negative values abort every command waiting on the event.
    Failed(cl_int),
}

impl ExecutionStatus {
    pub fn code(&self) -> cl_int {
        match self {
            ExecutionStatus::Complete => 0,
            ExecutionStatus::Running => 1,
            ExecutionStatus::Submitted => 2,
            ExecutionStatus::Queued => 3,
            ExecutionStatus::Failed(code) => *code,
        }
    }
}

/// Ordered collection of owned event handles.
///
/// Every handle in the list holds exactly one native reference, released on
/// drop. `move_from` transfers references without retain/release traffic,
/// `copy_from` retains so both lists can release independently.
#[derive(Debug, Default)]
pub struct EventList {
    events: Vec<cl_event>,
}

unsafe impl Send for EventList {}

impl EventList {
    pub fn new() -> Self {
        Self::default()
    }

    /// A list holding one manually signalled event.
    pub fn user_event(context: &Context) -> Result<Self> {
        let event = unsafe { create_user_event(context.get()) }.native("clCreateUserEvent")?;
        Ok(Self {
            events: vec![event],
        })
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn ids(&self) -> &[cl_event] {
        &self.events
    }

    /// Takes ownership of an event produced by an enqueue call. No retain.
    pub(crate) fn adopt(&mut self, event: cl_event) {
        self.events.push(event);
    }

    /// Moves every event out of `other`; `other` is left empty.
    pub fn move_from(&mut self, other: &mut EventList) {
        if other.is_empty() {
            return;
        }
        self.events.append(&mut other.events);
    }

    /// Appends `other`'s events, retaining each one.
    pub fn copy_from(&mut self, other: &EventList) -> Result<()> {
        self.events.reserve(other.len());
        for &event in &other.events {
            unsafe { retain_event(event) }.native("clRetainEvent")?;
            self.events.push(event);
        }
        Ok(())
    }

    /// Blocks until every event has reached a terminal state.
    pub fn wait(&self) -> Result<()> {
        if self.events.is_empty() {
            return Err(Error::invalid("EventList is not initialized"));
        }
        unsafe { wait_for_events(&self.events) }.native("clWaitForEvents")
    }

    /// Sets the status of the user event at `index`.
    pub fn set_status(&self, status: ExecutionStatus, index: usize) -> Result<()> {
        let event = *self
            .events
            .get(index)
            .ok_or_else(|| Error::OutOfRange("event index is out of range".into()))?;
        unsafe { set_user_event_status(event, status.code()) }.native("clSetUserEventStatus")
    }

    /// Releases every held event.
    pub fn clear(&mut self) {
        for event in self.events.drain(..) {
            if let Err(code) = unsafe { release_event(event) } {
                log::warn!("clReleaseEvent error={code}");
            }
        }
    }
}

impl Drop for EventList {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Count and pointer for an optional wait list. Empty lists pass null.
pub(crate) fn wait_list(wait_events: Option<&EventList>) -> (cl_uint, *const cl_event) {
    match wait_events {
        Some(list) if !list.is_empty() => (list.len() as cl_uint, list.events.as_ptr()),
        _ => (0, ptr::null()),
    }
}

/// Hands the event of the enqueue that just succeeded to `events`, or drops
/// the reference when nobody asked for it.
pub(crate) fn attach(events: Option<&mut EventList>, event: cl_event) {
    match events {
        Some(list) => list.adopt(event),
        None if event.is_null() => {}
        None => {
            if let Err(code) = unsafe { release_event(event) } {
                log::warn!("clReleaseEvent error={code}");
            }
        }
    }
}

#[test]
fn empty_list_behaviour() {
    let mut a = EventList::new();
    let mut b = EventList::new();
    assert_eq!(a.len(), 0);
    a.move_from(&mut b);
    a.copy_from(&b).unwrap();
    assert!(a.is_empty());
    assert!(a.wait().unwrap_err().is_invalid_argument());
    assert!(matches!(
        a.set_status(ExecutionStatus::Complete, 0),
        Err(Error::OutOfRange(_))
    ));
    let (num, ids) = wait_list(Some(&a));
    assert_eq!(num, 0);
    assert!(ids.is_null());
}

#[test]
fn status_codes() {
    assert_eq!(ExecutionStatus::Complete.code(), 0);
    assert_eq!(ExecutionStatus::Queued.code(), 3);
    assert_eq!(ExecutionStatus::Failed(-5).code(), -5);
}
