// SPDX-License-Identifier: Apache-2.0 OR MIT
use netdev_bridge::device::{BufferAllocator, BufferPool, BufferSize};
use proptest::prelude::*;

proptest! {
    /// **Property:** a successful allocation is aligned, has the requested
    /// capacity and head-room, and payload room is what remains.
    #[test]
    fn test_alloc_layout(
        size in 1usize..9000,
        align_shift in 0u32..9,
        headroom in 0usize..64,
    ) {
        let align = 1usize << align_shift;
        let pool = BufferPool::new(2, 2, 2);
        let buf = pool.alloc_buf(size, align, headroom);
        if headroom > size || size > BufferSize::Jumbo.size() {
            prop_assert!(buf.is_none());
        } else if size + align - 1 <= BufferSize::Jumbo.size() {
            prop_assert!(buf.is_some());
        }
        // Between the two bounds success depends on where the backing memory sits
        if let Some(buf) = buf {
            prop_assert!(buf.is_aligned());
            prop_assert_eq!(buf.capacity(), size);
            prop_assert_eq!(buf.headroom(), headroom);
            prop_assert_eq!(buf.room(), size - headroom);
        }
    }

    /// **Property:** copying a payload in stores exactly the bytes that fit.
    #[test]
    fn test_copy_in_truncates_to_room(
        payload in proptest::collection::vec(any::<u8>(), 0..3000),
        headroom in 0usize..32,
    ) {
        let pool = BufferPool::new(4, 4, 0);
        let mut buf = pool.alloc_buf(2048, 8, headroom).unwrap();
        let n = buf.copy_in(&payload);
        prop_assert_eq!(n, payload.len().min(2048 - headroom));
        prop_assert_eq!(buf.data(), &payload[..n]);
    }

    /// **Property:** dropping every buffer restores the pool's free footprint.
    #[test]
    fn test_buffers_return_to_pool(sizes in proptest::collection::vec(1usize..8000, 0..24)) {
        let pool = BufferPool::new(8, 8, 8);
        let before = pool.free_footprint();
        let held: Vec<_> = sizes
            .iter()
            .filter_map(|&s| pool.alloc_buf(s, 64, 0))
            .collect();
        drop(held);
        prop_assert_eq!(pool.free_footprint(), before);
    }
}
