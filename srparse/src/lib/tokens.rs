use std::iter::Peekable;

use srgrammar::Span;

/// The interface between the user's lexer and the parse engine. Token types
/// are identified by name: [Token::kind] must return one of the token names
/// used in the grammar the parser was built from. Tokens with a kind the
/// grammar doesn't reference cause an ordinary syntax error at parse time.
pub trait Token {
    /// The name of this token's type.
    fn kind(&self) -> &str;

    /// The byte offsets of this token in the user's input.
    fn span(&self) -> Span;
}

/// A sequential source of tokens with a single token of lookahead. The end
/// of input is represented by `None`: once either method has returned
/// `None`, both must continue to do so. `peek` must return the same token
/// that the next call to `advance` will yield.
pub trait TokenStream<TokT: Token> {
    /// Return a reference to the next token without consuming it, or `None`
    /// if the stream is exhausted.
    fn peek(&mut self) -> Option<&TokT>;

    /// Consume and return the next token, or `None` if the stream is
    /// exhausted.
    fn advance(&mut self) -> Option<TokT>;
}

/// Any peekable iterator over tokens can feed the parser directly.
impl<TokT: Token, I: Iterator<Item = TokT>> TokenStream<TokT> for Peekable<I> {
    fn peek(&mut self) -> Option<&TokT> {
        Peekable::peek(self)
    }

    fn advance(&mut self) -> Option<TokT> {
        self.next()
    }
}
