use std::ops::Range;

pub const DEFAULT_OVERSCAN: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportOptions {
    pub item_height: u32,
    pub container_height: u32,
    pub overscan: u32,
}

impl ViewportOptions {
    pub fn new(item_height: u32, container_height: u32) -> Self {
        Self {
            item_height,
            container_height,
            overscan: DEFAULT_OVERSCAN,
        }
    }

    pub fn with_overscan(mut self, overscan: u32) -> Self {
        self.overscan = overscan;
        self
    }
}

/// Slice of an ordered collection that intersects the viewport plus overscan.
///
/// `start_index..=end_index` is inclusive. For an empty collection both are 0
/// and [`VirtualWindow::range`] is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualWindow {
    pub start_index: usize,
    pub end_index: usize,
    pub total_height: u64,
    pub offset_y: u64,
    pub item_count: usize,
}

impl VirtualWindow {
    pub fn range(&self) -> Range<usize> {
        if self.item_count == 0 {
            return 0..0;
        }
        self.start_index..self.end_index + 1
    }

    pub fn len(&self) -> usize {
        self.range().len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_count == 0
    }

    pub fn contains(&self, index: usize) -> bool {
        self.range().contains(&index)
    }
}

pub fn compute_window(item_count: usize, scroll_top: u64, options: ViewportOptions) -> VirtualWindow {
    let item_height = u64::from(options.item_height.max(1));
    let container_height = u64::from(options.container_height);
    let overscan = u64::from(options.overscan);
    let total_height = item_count as u64 * item_height;

    if item_count == 0 {
        return VirtualWindow {
            start_index: 0,
            end_index: 0,
            total_height,
            offset_y: 0,
            item_count,
        };
    }

    let last = (item_count - 1) as u64;
    let first_visible = scroll_top / item_height;
    let last_visible = scroll_top
        .saturating_add(container_height)
        .div_ceil(item_height);

    let end_index = last_visible.saturating_add(overscan).min(last);
    // Past the end of content the lower edge can overtake the clamped upper edge.
    let start_index = first_visible.saturating_sub(overscan).min(end_index);

    VirtualWindow {
        start_index: start_index as usize,
        end_index: end_index as usize,
        total_height,
        offset_y: start_index * item_height,
        item_count,
    }
}

/// Memoized windowed view over an owned collection.
#[derive(Debug, Clone)]
pub struct VirtualList<T> {
    items: Vec<T>,
    options: ViewportOptions,
    scroll_top: u64,
    window: VirtualWindow,
}

impl<T> VirtualList<T> {
    pub fn new(items: Vec<T>, options: ViewportOptions) -> Self {
        let window = compute_window(items.len(), 0, options);
        Self {
            items,
            options,
            scroll_top: 0,
            window,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn options(&self) -> ViewportOptions {
        self.options
    }

    pub fn scroll_top(&self) -> u64 {
        self.scroll_top
    }

    pub fn window(&self) -> VirtualWindow {
        self.window
    }

    pub fn visible_items(&self) -> &[T] {
        &self.items[self.window.range()]
    }

    pub fn total_height(&self) -> u64 {
        self.window.total_height
    }

    pub fn offset_y(&self) -> u64 {
        self.window.offset_y
    }

    pub fn max_scroll_top(&self) -> u64 {
        (self.items.len() as u64 * u64::from(self.options.item_height.max(1)))
            .saturating_sub(u64::from(self.options.container_height))
    }

    /// Replaces the collection. Scroll position is kept but clamped to the new content.
    pub fn set_items(&mut self, items: Vec<T>) {
        self.items = items;
        self.scroll_top = self.scroll_top.min(self.max_scroll_top());
        self.recompute();
    }

    pub fn set_scroll_top(&mut self, scroll_top: u64) {
        let clamped = scroll_top.min(self.max_scroll_top());
        if clamped == self.scroll_top {
            return;
        }
        self.scroll_top = clamped;
        self.recompute();
    }

    pub fn scroll_by(&mut self, delta: i64) {
        let next = if delta < 0 {
            self.scroll_top.saturating_sub(delta.unsigned_abs())
        } else {
            self.scroll_top.saturating_add(delta as u64)
        };
        self.set_scroll_top(next);
    }

    pub fn set_container_height(&mut self, container_height: u32) {
        if container_height == self.options.container_height {
            return;
        }
        self.options.container_height = container_height;
        self.scroll_top = self.scroll_top.min(self.max_scroll_top());
        self.recompute();
    }

    /// Scrolls the minimum amount needed for row `index` to be fully inside the container.
    pub fn scroll_into_view(&mut self, index: usize) {
        if index >= self.items.len() {
            return;
        }
        let item_height = u64::from(self.options.item_height.max(1));
        let container = u64::from(self.options.container_height);
        let top = index as u64 * item_height;
        let bottom = top + item_height;
        if top < self.scroll_top {
            self.set_scroll_top(top);
        } else if bottom > self.scroll_top.saturating_add(container) {
            self.set_scroll_top(bottom.saturating_sub(container));
        }
    }

    fn recompute(&mut self) {
        self.window = compute_window(self.items.len(), self.scroll_top, self.options);
    }
}
