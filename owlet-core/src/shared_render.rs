use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use owlet_template::{RenderResult, WidgetFuture};

#[derive(Default)]
struct State {
    /// `None` once finished, or while one of the handles is polling it.
    future: Option<WidgetFuture>,
    result: Option<RenderResult<()>>,
    waiters: Vec<Waker>,
}

/// A render every clone can await. Whichever handle is polled drives it;
/// all of them see the same result.
#[derive(Clone)]
pub(crate) struct SharedRender(Rc<RefCell<State>>);

impl SharedRender {
    pub(crate) fn new(future: WidgetFuture) -> Self {
        SharedRender(Rc::new(RefCell::new(State {
            future: Some(future),
            ..State::default()
        })))
    }

    pub(crate) fn is_done(&self) -> bool {
        self.0.borrow().result.is_some()
    }
}

impl Future for SharedRender {
    type Output = RenderResult<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut future = {
            let mut state = self.0.borrow_mut();
            if let Some(result) = &state.result {
                return Poll::Ready(result.clone());
            }
            match state.future.take() {
                Some(future) => future,
                None => {
                    register(&mut state.waiters, cx.waker());
                    return Poll::Pending;
                }
            }
        };

        // The cell is not borrowed while the render runs.
        let poll = future.as_mut().poll(cx);
        let mut state = self.0.borrow_mut();
        match poll {
            Poll::Ready(result) => {
                state.result = Some(result.clone());
                for waker in state.waiters.drain(..) {
                    waker.wake();
                }
                Poll::Ready(result)
            }
            Poll::Pending => {
                state.future = Some(future);
                register(&mut state.waiters, cx.waker());
                Poll::Pending
            }
        }
    }
}

fn register(waiters: &mut Vec<Waker>, waker: &Waker) {
    if !waiters.iter().any(|w| w.will_wake(waker)) {
        waiters.push(waker.clone());
    }
}
