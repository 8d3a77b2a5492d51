// SPDX-License-Identifier: Apache-2.0 OR MIT
use netdev_bridge::pipeline::lang::parse;
use proptest::prelude::*;

proptest! {
    /// **Property:** `parse` returns `Ok` or `Err` for any input without
    /// panicking.
    #[test]
    fn test_parse_does_not_panic(input in "\\PC{0,200}") {
        let _ = parse(&input);
    }

    /// **Property:** a linear chain of N anonymous elements yields N
    /// declarations and N-1 connections.
    #[test]
    fn test_chain_shape(n in 1usize..20) {
        let text = vec!["Counter"; n].join(" -> ") + ";";
        let program = parse(&text).unwrap();
        prop_assert_eq!(program.declarations.len(), n);
        prop_assert_eq!(program.connections.len(), n - 1);
    }
}
