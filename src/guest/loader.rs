//! Guest Module Loader
//!
//! Fetches the artifact, validates it, and instantiates it against the
//! host's import table using the browser's WebAssembly API.

use super::error::{LoadError, LoadResult};
use std::future::Future;
use std::pin::pin;

use futures::future::{self, Either};

/// Race `fut` against `sleep`, failing with [`LoadError::Timeout`] if the
/// sleep finishes first
pub async fn with_timeout<T, F, S>(fut: F, ms: u32, sleep: S) -> LoadResult<T>
where
    F: Future<Output = LoadResult<T>>,
    S: Future<Output = ()>,
{
    match future::select(pin!(fut), pin!(sleep)).await {
        Either::Left((result, _)) => result,
        Either::Right(((), _)) => Err(LoadError::Timeout { ms }),
    }
}

#[cfg(target_arch = "wasm32")]
pub use web::*;

#[cfg(target_arch = "wasm32")]
mod web {
    use super::with_timeout;
    use crate::config::HostConfig;
    use crate::console_log;
    use crate::guest::callback::ColorCallback;
    use crate::guest::error::{LoadError, LoadResult, TickError};
    use crate::guest::memory::MemorySlot;
    use crate::guest::validate::ModuleValidator;
    use crate::guest::Guest;
    use crate::platform::web::{describe, sleep_ms};
    use crate::platform::Presenter;
    use js_sys::{Function, Object, Reflect, Uint8Array, WebAssembly};
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::JsFuture;

    /// Error raised inside the callback, waiting to be picked up by the
    /// frame export call that triggered it
    pub type ErrorSlot = Rc<RefCell<Option<TickError>>>;

    /// Callback shared between the import closure and the host
    pub type SharedCallback<P> = Rc<RefCell<ColorCallback<MemorySlot, P>>>;

    /// The import object handed to `WebAssembly.instantiate`
    ///
    /// Owns the callback closure; dropping the table while the guest can
    /// still call the import invalidates it.
    pub struct ImportTable {
        object: Object,
        memory: MemorySlot,
        error: ErrorSlot,
        _callback: Closure<dyn FnMut(i32) -> Result<(), JsValue>>,
    }

    impl ImportTable {
        pub fn new<P: Presenter + 'static>(
            config: &HostConfig,
            memory: MemorySlot,
            callback: SharedCallback<P>,
        ) -> LoadResult<Self> {
            let error: ErrorSlot = Rc::new(RefCell::new(None));
            let slot = Rc::clone(&error);

            let closure = Closure::wrap(Box::new(move |vals_ptr: i32| -> Result<(), JsValue> {
                let result = callback.borrow_mut().on_color(vals_ptr);
                match result {
                    Ok(_) => Ok(()),
                    Err(e) => {
                        // Throwing unwinds the guest; the typed error is
                        // picked up on the host side of the export call
                        let err = js_sys::Error::new(&e.to_string());
                        *slot.borrow_mut() = Some(e);
                        Err(err.into())
                    }
                }
            }) as Box<dyn FnMut(i32) -> Result<(), JsValue>>);

            let env = Object::new();
            Reflect::set(&env, &JsValue::from_str(&config.callback_name), closure.as_ref())
                .map_err(|_| LoadError::InstantiationFailed {
                    reason: format!("failed to set {} import", config.callback_name),
                })?;

            let object = Object::new();
            Reflect::set(&object, &JsValue::from_str(&config.import_namespace), &env).map_err(
                |_| LoadError::InstantiationFailed {
                    reason: format!("failed to set {} imports", config.import_namespace),
                },
            )?;

            Ok(Self {
                object,
                memory,
                error,
                _callback: closure,
            })
        }

        pub fn object(&self) -> &Object {
            &self.object
        }
    }

    /// A live guest instance
    pub struct ModuleInstance {
        memory: WebAssembly::Memory,
        frame: Function,
        callback_error: ErrorSlot,
    }

    impl ModuleInstance {
        pub fn memory(&self) -> &WebAssembly::Memory {
            &self.memory
        }
    }

    impl Guest for ModuleInstance {
        fn draw_frame(&mut self, frame: u64, total_steps: Option<u32>) -> Result<(), TickError> {
            self.callback_error.borrow_mut().take();

            // f64 carries the counter exactly up to 2^53
            let frame = JsValue::from_f64(frame as f64);
            let result = match total_steps {
                Some(steps) => self
                    .frame
                    .call2(&JsValue::UNDEFINED, &frame, &JsValue::from(steps)),
                None => self.frame.call1(&JsValue::UNDEFINED, &frame),
            };

            result.map(|_| ()).map_err(|e| {
                self.callback_error
                    .borrow_mut()
                    .take()
                    .unwrap_or_else(|| TickError::Trap {
                        reason: describe(&e),
                    })
            })
        }
    }

    /// Fetch the artifact bytes
    pub async fn fetch_artifact(path: &str) -> LoadResult<Vec<u8>> {
        let fetch_error = |reason: String| LoadError::Fetch {
            path: path.to_string(),
            reason,
        };

        let window = web_sys::window().ok_or_else(|| fetch_error("no window object".into()))?;

        let response: web_sys::Response = JsFuture::from(window.fetch_with_str(path))
            .await
            .map_err(|e| fetch_error(describe(&e)))?
            .dyn_into()
            .map_err(|_| fetch_error("failed to cast to Response".into()))?;

        if !response.ok() {
            return Err(LoadError::HttpStatus {
                path: path.to_string(),
                status: response.status(),
            });
        }

        let promise = response
            .array_buffer()
            .map_err(|e| fetch_error(describe(&e)))?;
        let buffer = JsFuture::from(promise)
            .await
            .map_err(|e| fetch_error(describe(&e)))?;

        Ok(Uint8Array::new(&buffer).to_vec())
    }

    /// Validate and instantiate module bytes
    ///
    /// On success the instance's memory is wired into the import table's
    /// memory slot.
    pub async fn instantiate(
        bytes: &[u8],
        config: &HostConfig,
        imports: &ImportTable,
    ) -> LoadResult<ModuleInstance> {
        ModuleValidator::new(config).validate(bytes)?;

        let result = JsFuture::from(WebAssembly::instantiate_buffer(bytes, imports.object()))
            .await
            .map_err(|e| LoadError::InstantiationFailed {
                reason: describe(&e),
            })?;

        let instance: WebAssembly::Instance = Reflect::get(&result, &JsValue::from_str("instance"))
            .ok()
            .and_then(|i| i.dyn_into().ok())
            .ok_or_else(|| LoadError::InstantiationFailed {
                reason: "failed to cast to Instance".to_string(),
            })?;
        let exports = instance.exports();

        let memory: WebAssembly::Memory = get_export(&exports, &config.memory_export)?
            .dyn_into()
            .map_err(|_| LoadError::WrongExportType {
                name: config.memory_export.clone(),
                expected: "Memory".to_string(),
                got: "unknown".to_string(),
            })?;

        let frame: Function = get_export(&exports, &config.frame_export)?
            .dyn_into()
            .map_err(|_| LoadError::WrongExportType {
                name: config.frame_export.clone(),
                expected: "Function".to_string(),
                got: "unknown".to_string(),
            })?;

        let arity = config.frame_arity();
        if frame.length() as usize != arity {
            return Err(LoadError::WrongExportType {
                name: config.frame_export.clone(),
                expected: format!("function of {} arguments", arity),
                got: format!("function of {} arguments", frame.length()),
            });
        }

        imports.memory.set(memory.clone());

        Ok(ModuleInstance {
            memory,
            frame,
            callback_error: Rc::clone(&imports.error),
        })
    }

    /// Fetch and instantiate, bounded by the configured timeout
    pub async fn load(config: &HostConfig, imports: &ImportTable) -> LoadResult<ModuleInstance> {
        console_log!("[loader] Loading {}", config.artifact_path);

        let load = async {
            let bytes = fetch_artifact(&config.artifact_path).await?;
            instantiate(&bytes, config, imports).await
        };

        let instance = match config.load_timeout_ms {
            Some(ms) => with_timeout(load, ms, sleep_ms(ms)).await?,
            None => load.await?,
        };

        console_log!("[loader] Ready");
        Ok(instance)
    }

    fn get_export(exports: &Object, name: &str) -> LoadResult<JsValue> {
        let value = Reflect::get(exports, &JsValue::from_str(name)).unwrap_or(JsValue::UNDEFINED);
        if value.is_undefined() {
            return Err(LoadError::MissingExport {
                name: name.to_string(),
            });
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn test_with_timeout_passes_result_through() {
        let ok = block_on(with_timeout(async { Ok(7) }, 100, future::pending()));
        assert_eq!(ok, Ok(7));

        let err: LoadResult<()> = block_on(with_timeout(
            async {
                Err(LoadError::InvalidModule {
                    reason: "bad".to_string(),
                })
            },
            100,
            future::pending(),
        ));
        assert!(matches!(err, Err(LoadError::InvalidModule { .. })));
    }

    #[test]
    fn test_with_timeout_expires() {
        let result: LoadResult<u8> =
            block_on(with_timeout(future::pending(), 250, future::ready(())));
        assert_eq!(result, Err(LoadError::Timeout { ms: 250 }));
    }
}
