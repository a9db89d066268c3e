/// Cross-module test suites
///
/// Unit tests live next to the code they cover. The suites here exercise
/// several modules together:
/// - ring, polynomial and matrix properties under random inputs
/// - trapdoor generation and preimage sampling end to end
