use std::marker::PhantomData;
use std::ptr::NonNull;

/// Singly linked FIFO with O(1) append and pop, one allocation per node.
///
/// Nodes are owned through raw pointers from `Box::into_raw` and reclaimed with
/// `Box::from_raw` when popped.
pub(crate) struct Chain<T> {
    head: Option<NonNull<Node<T>>>,
    tail: Option<NonNull<Node<T>>>,
    len: usize,
    _owns: PhantomData<Box<Node<T>>>,
}

struct Node<T> {
    value: T,
    next: Option<NonNull<Node<T>>>,
}

// Every node is uniquely owned by the chain.
unsafe impl<T: Send> Send for Chain<T> {}
unsafe impl<T: Sync> Sync for Chain<T> {}

impl<T> Chain<T> {
    pub(crate) fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
            _owns: PhantomData,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub(crate) fn push_back(&mut self, value: T) {
        let node = Box::new(Node { value, next: None });
        // SAFETY: `Box::into_raw` never returns null.
        let node = unsafe { NonNull::new_unchecked(Box::into_raw(node)) };

        match self.tail {
            // SAFETY: `tail` points at a live node owned by this chain.
            Some(tail) => unsafe { (*tail.as_ptr()).next = Some(node) },
            None => self.head = Some(node),
        }

        self.tail = Some(node);
        self.len += 1;
    }

    pub(crate) fn pop_front(&mut self) -> Option<T> {
        self.head.map(|head| {
            // SAFETY: `head` came from `Box::into_raw` and is unlinked right here,
            // so ownership returns to this box exactly once.
            let node = unsafe { Box::from_raw(head.as_ptr()) };
            self.head = node.next;
            if self.head.is_none() {
                self.tail = None;
            }
            self.len -= 1;
            node.value
        })
    }

    pub(crate) fn front(&self) -> Option<&T> {
        // SAFETY: `head` points at a live node borrowed for the lifetime of `&self`.
        self.head.map(|head| unsafe { &(*head.as_ptr()).value })
    }
}

impl<T> Drop for Chain<T> {
    fn drop(&mut self) {
        while self.pop_front().is_some() {}
    }
}
